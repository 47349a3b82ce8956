use std::sync::Arc;

use anyhow::Context;
use the_voxelflow::array::{ArrayData, TaggedArray, Value};
use the_voxelflow::config::{load_and_validate_config, EngineConfig, ProviderRegistry};
use the_voxelflow::graph::Graph;
use the_voxelflow::metadata::AxisTags;
use the_voxelflow::observability::init_tracing;
use the_voxelflow::operators::data_selection::{
    dataset_roles, multi_lane_data_selection, DatasetInfo,
};
use the_voxelflow::operators::export::{parse_node_data_url, MemoryVolumeSink, OpExportVolume};

const EXPORT_URL: &str = "http://localhost:8000/api/node/demo/raw";

/// A `yxc` image whose values encode their own coordinates.
fn synthetic_image(height: usize, width: usize, channels: usize) -> anyhow::Result<TaggedArray> {
    let values: Vec<u8> = (0..height * width * channels)
        .map(|i| (i % 256) as u8)
        .collect();
    let data = ArrayData::from_shape_vec(&[height, width, channels], values)?;
    Ok(TaggedArray::tagged(data, AxisTags::from_keys("yxc")?))
}

/// Demo: two lanes of preloaded data, normalized to the configured axis
/// order, with the first lane exported to an in-memory volume store.
fn run_demo(config: EngineConfig) -> anyhow::Result<()> {
    println!("=== Voxelflow Lane Pipeline Demo ===\n");

    let graph = Graph::new(config)?;
    let lanes = multi_lane_data_selection(&graph, Arc::new(ProviderRegistry::new()), None)?;
    let cwd = std::env::current_dir()?;
    lanes
        .input("WorkingDirectory")?
        .set_value(cwd.to_string_lossy().to_string())?;
    lanes
        .input("DatasetRoles")?
        .set_value(dataset_roles(&["Raw Data"]))?;

    let images = [synthetic_image(64, 48, 3)?, synthetic_image(32, 32, 1)?];
    lanes.input("DatasetGroup")?.resize(images.len())?;
    for (lane, image) in images.into_iter().enumerate() {
        let info = DatasetInfo::preloaded(image).with_nickname(&format!("lane-{}", lane));
        lanes
            .input("DatasetGroup")?
            .at(lane)?
            .at(0)?
            .set_value(Value::object(info))?;
    }

    println!("Lanes: {}", lanes.len());
    for lane in 0..lanes.len() {
        let image = lanes.output("Image")?.at(lane)?;
        let meta = image.meta();
        let name = lanes.output("ImageName")?.at(lane)?.value()?;
        println!(
            "  lane {}: '{}' axes={} shape={:?} channels={:?}",
            lane,
            name.as_str().unwrap_or_default(),
            meta.axis_keys().unwrap_or_default(),
            meta.shape.clone().unwrap_or_default(),
            meta.channel_names.clone().unwrap_or_default(),
        );
    }

    println!("\n=== Export ===");
    let sink = Arc::new(MemoryVolumeSink::new());
    let export = OpExportVolume::new(&graph, sink.clone(), true)?;
    export.notify_progress(|percent| println!("  progress: {}%", percent));
    export.input("NodeDataUrl")?.set_value(EXPORT_URL)?;
    export
        .input("Input")?
        .connect(&lanes.output("NonTransposedImageGroup")?.at(0)?.at(0)?)?;
    export.run_export().wait()?;

    let target = parse_node_data_url(EXPORT_URL)?;
    let stored = sink
        .volume(&target)
        .context("export finished without storing the volume")?;
    println!(
        "Stored {} as {} {:?} ({})",
        target,
        stored.axistags.keys(),
        stored.shape,
        stored.dtype
    );

    graph.clean_up();
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => load_and_validate_config(&path)
            .with_context(|| format!("loading config from {}", path))?,
        None => EngineConfig::default(),
    };
    init_tracing(Some(config.get_log_filter()));

    run_demo(config)
}
