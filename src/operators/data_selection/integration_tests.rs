// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use parking_lot::Mutex;

    use crate::array::{ArrayData, Roi, TaggedArray, Value};
    use crate::config::ProviderRegistry;
    use crate::errors::{GraphError, ResolutionError};
    use crate::graph::{Graph, Node};
    use crate::metadata::{AxisTags, Dtype};
    use crate::operators::data_selection::{
        dataset_roles, multi_lane_data_selection, DatasetInfo, OpDataSelection,
        OpDataSelectionGroup,
    };
    use crate::operators::OpArrayPiper;
    use crate::operators::stub::{registry_with, tagged_ramp, touch, FixedArrayFactory, MemoryProject};
    use crate::traits::ProjectFile;

    fn tczyx() -> Option<Vec<String>> {
        Some(vec!["tczyx".to_string()])
    }

    fn selection(
        graph: &Graph,
        registry: Arc<ProviderRegistry>,
        force: Option<Vec<String>>,
        cwd: &Path,
    ) -> Node {
        let node = Node::new(graph, OpDataSelection::new(registry).with_force_axis_order(force)).unwrap();
        node.input("WorkingDirectory")
            .unwrap()
            .set_value(cwd.to_str().unwrap())
            .unwrap();
        node.input("RoleName").unwrap().set_value("Raw Data").unwrap();
        node
    }

    fn file_dataset(
        dir: &Path,
        name: &str,
        array: TaggedArray,
    ) -> (Arc<FixedArrayFactory>, Arc<ProviderRegistry>, DatasetInfo) {
        touch(dir, name);
        let factory = Arc::new(FixedArrayFactory::new(array));
        let registry = registry_with(&["npy"], factory.clone());
        let info = DatasetInfo::from_path(name, dir, &registry, None).unwrap();
        (factory, registry, info)
    }

    #[test]
    fn test_singleton_axes_are_moved_into_the_forced_order() {
        let graph = Graph::with_defaults().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let (factory, registry, info) =
            file_dataset(dir.path(), "cells.npy", tagged_ramp(&[1, 1, 50, 50, 1], "tzyxc"));
        let node = selection(&graph, registry, tczyx(), dir.path());
        node.input("Dataset").unwrap().set_value(Value::object(info)).unwrap();

        let image = node.output("Image").unwrap();
        assert!(image.is_ready());
        assert_eq!(image.meta().shape, Some(vec![1, 1, 1, 50, 50]));
        assert_eq!(image.meta().axis_keys().as_deref(), Some("tczyx"));

        let raw = node.output("NonTransposedImage").unwrap();
        assert_eq!(raw.meta().shape, Some(vec![1, 1, 50, 50, 1]));
        assert_eq!(raw.meta().channel_names, Some(vec!["Raw Data".to_string()]));
        assert_eq!(raw.meta().drange, Some((0.0, 255.0)));

        let requests = factory.requests.lock();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].paths, vec![dir.path().join("cells.npy")]);
        drop(requests);

        let name = node.output("ImageName").unwrap().value().unwrap();
        assert_eq!(name.as_str(), Some("cells"));
        let labels = node.output("AllowLabels").unwrap().value().unwrap();
        assert_eq!(labels.as_bool(), Some(true));

        let data = image.get(&Roi::full(&[1, 1, 1, 50, 50])).wait().unwrap();
        let expected = tagged_ramp(&[1, 1, 50, 50, 1], "tzyxc")
            .data
            .permuted(&[0, 4, 1, 2, 3])
            .unwrap();
        assert_eq!(*data, expected);
    }

    #[test]
    fn test_missing_axes_are_inserted_as_singletons() {
        let graph = Graph::with_defaults().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let (_factory, registry, info) =
            file_dataset(dir.path(), "plane.npy", tagged_ramp(&[30, 40], "yx"));
        let node = selection(&graph, registry, tczyx(), dir.path());
        node.input("Dataset").unwrap().set_value(Value::object(info)).unwrap();

        let image = node.output("Image").unwrap();
        assert_eq!(image.meta().shape, Some(vec![1, 1, 1, 30, 40]));
        assert_eq!(image.meta().axis_keys().as_deref(), Some("tczyx"));

        let region = image
            .get(&Roi::new(vec![0, 0, 0, 2, 5], vec![1, 1, 1, 4, 8]))
            .wait()
            .unwrap();
        assert_eq!(region.shape(), vec![1, 1, 1, 2, 3]);
    }

    #[test]
    fn test_data_without_spatial_axes_is_rejected() {
        let graph = Graph::with_defaults().unwrap();
        let node = selection(
            &graph,
            Arc::new(ProviderRegistry::new()),
            tczyx(),
            Path::new("/"),
        );
        let info = DatasetInfo::preloaded(tagged_ramp(&[4, 3], "tc"));
        let err = node
            .input("Dataset")
            .unwrap()
            .set_value(Value::object(info))
            .unwrap_err();
        match err {
            GraphError::ConstraintViolation { message, .. } => {
                assert_eq!(message, "Data must always have at least the axes x and y")
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!node.output("Image").unwrap().is_ready());
    }

    #[test]
    fn test_no_allowed_order_is_a_constraint_violation() {
        let graph = Graph::with_defaults().unwrap();
        let node = selection(
            &graph,
            Arc::new(ProviderRegistry::new()),
            Some(vec!["yxc".to_string()]),
            Path::new("/"),
        );
        let info = DatasetInfo::preloaded(tagged_ramp(&[5, 6, 7], "zyx"));
        let err = node
            .input("Dataset")
            .unwrap()
            .set_value(Value::object(info))
            .unwrap_err();
        assert!(matches!(err, GraphError::ConstraintViolation { .. }));
        assert!(err.to_string().contains("zyx"));
    }

    #[test]
    fn test_empty_forced_order_keeps_the_provider_order() {
        let graph = Graph::with_defaults().unwrap();
        let node = selection(
            &graph,
            Arc::new(ProviderRegistry::new()),
            Some(Vec::new()),
            Path::new("/"),
        );
        let info = DatasetInfo::preloaded(tagged_ramp(&[5, 6, 2], "yxc"));
        node.input("Dataset").unwrap().set_value(Value::object(info)).unwrap();

        let image = node.output("Image").unwrap();
        assert_eq!(image.meta().axis_keys().as_deref(), Some("yxc"));
        assert_eq!(
            image.meta().channel_names,
            Some(vec!["Raw Data-0".to_string(), "Raw Data-1".to_string()])
        );
        let name = node.output("ImageName").unwrap().value().unwrap();
        assert_eq!(name.as_str(), Some("preloaded-uint8-array"));
    }

    #[test]
    fn test_changing_dimensionality_keeps_the_previous_configuration() {
        let graph = Graph::with_defaults().unwrap();
        let node = selection(
            &graph,
            Arc::new(ProviderRegistry::new()),
            tczyx(),
            Path::new("/"),
        );
        let dataset = node.input("Dataset").unwrap();
        dataset
            .set_value(Value::object(DatasetInfo::preloaded(tagged_ramp(&[4, 5, 6], "zyx"))))
            .unwrap();
        assert_eq!(
            node.output("Image").unwrap().meta().shape,
            Some(vec![1, 1, 4, 5, 6])
        );

        let err = dataset
            .set_value(Value::object(DatasetInfo::preloaded(tagged_ramp(&[5, 6], "yx"))))
            .unwrap_err();
        assert!(matches!(
            err,
            GraphError::DimensionalityMismatch {
                expected: 3,
                found: 2,
                ..
            }
        ));

        let image = node.output("Image").unwrap();
        assert!(image.is_ready());
        assert_eq!(image.meta().shape, Some(vec![1, 1, 4, 5, 6]));
    }

    #[test]
    fn test_declared_axistags_reinterpret_the_data() {
        let graph = Graph::with_defaults().unwrap();
        let node = selection(
            &graph,
            Arc::new(ProviderRegistry::new()),
            tczyx(),
            Path::new("/"),
        );
        let info = DatasetInfo::preloaded(tagged_ramp(&[2, 3], "yx"))
            .with_axistags(AxisTags::from_keys("xy").unwrap());
        node.input("Dataset").unwrap().set_value(Value::object(info)).unwrap();

        let raw = node.output("NonTransposedImage").unwrap();
        assert_eq!(raw.meta().axis_keys().as_deref(), Some("xy"));
        let image = node.output("Image").unwrap();
        assert_eq!(image.meta().shape, Some(vec![1, 1, 1, 3, 2]));
    }

    #[test]
    fn test_project_datasets_come_from_the_project_file() {
        let graph = Graph::with_defaults().unwrap();
        let node = selection(
            &graph,
            Arc::new(ProviderRegistry::new()),
            tczyx(),
            Path::new("/"),
        );
        let project = MemoryProject::default()
            .with_dataset("local_data/abc", tagged_ramp(&[8, 9], "yx"));
        node.input("ProjectFile")
            .unwrap()
            .set_value(Value::object(ProjectFile::new(project)))
            .unwrap();
        node.input("Dataset")
            .unwrap()
            .set_value(Value::object(DatasetInfo::project_internal(
                "local_data/abc",
                "stored",
            )))
            .unwrap();

        let image = node.output("Image").unwrap();
        assert_eq!(image.meta().shape, Some(vec![1, 1, 1, 8, 9]));
        let name = node.output("ImageName").unwrap().value().unwrap();
        assert_eq!(name.as_str(), Some("stored"));

        let missing = node.input("Dataset").unwrap().set_value(Value::object(
            DatasetInfo::project_internal("local_data/nope", "gone"),
        ));
        assert!(matches!(
            missing,
            Err(GraphError::Resolution(ResolutionError::InternalPathNotFound { .. }))
        ));
    }

    #[test]
    fn test_placeholders_serve_zeros_of_the_lane_shape() {
        let graph = Graph::with_defaults().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let (factory, registry, info) =
            file_dataset(dir.path(), "big.npy", tagged_ramp(&[2, 2], "yx"));
        let info = info.with_placeholder(vec![10, 20], Dtype::U16);
        let node = selection(&graph, registry, tczyx(), dir.path());
        node.input("Dataset").unwrap().set_value(Value::object(info)).unwrap();

        assert!(factory.requests.lock().is_empty());
        let image = node.output("Image").unwrap();
        assert_eq!(image.meta().shape, Some(vec![1, 1, 1, 10, 20]));
        assert_eq!(image.meta().dtype, Some(Dtype::U16));
        let data = image.get(&Roi::full(&[1, 1, 1, 10, 20])).wait().unwrap();
        assert_eq!(*data, ArrayData::zeros(Dtype::U16, &[1, 1, 1, 10, 20]));
    }

    #[test]
    fn test_unknown_extensions_fail_to_resolve() {
        let graph = Graph::with_defaults().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let (_factory, registry, _) =
            file_dataset(dir.path(), "known.npy", tagged_ramp(&[2, 2], "yx"));
        touch(dir.path(), "other.tif");
        let info = DatasetInfo::from_path("other.tif", dir.path(), &registry, None).unwrap();
        let node = selection(&graph, registry, tczyx(), dir.path());
        let err = node
            .input("Dataset")
            .unwrap()
            .set_value(Value::object(info))
            .unwrap_err();
        assert!(matches!(
            err,
            GraphError::Resolution(ResolutionError::UnsupportedExtension { ref extension })
                if extension == ".tif"
        ));
    }

    #[test]
    fn test_group_exposes_one_image_per_role() {
        let graph = Graph::with_defaults().unwrap();
        let group = Node::new(
            &graph,
            OpDataSelectionGroup::new(Arc::new(ProviderRegistry::new()))
                .with_force_axis_order(tczyx()),
        )
        .unwrap();
        group
            .input("WorkingDirectory")
            .unwrap()
            .set_value("/")
            .unwrap();
        group
            .input("DatasetRoles")
            .unwrap()
            .set_value(dataset_roles(&["Raw Data", "Prediction Mask"]))
            .unwrap();
        let datasets = group.input("DatasetGroup").unwrap();
        assert_eq!(datasets.len(), 2);

        datasets
            .at(0)
            .unwrap()
            .set_value(Value::object(
                DatasetInfo::preloaded(tagged_ramp(&[6, 7, 3], "yxc")).with_nickname("raw"),
            ))
            .unwrap();

        let image = group.output("Image").unwrap();
        assert!(image.is_ready());
        assert_eq!(image.meta().shape, Some(vec![1, 3, 1, 6, 7]));
        assert_eq!(
            image.meta().channel_names,
            Some(vec![
                "Raw Data-0".to_string(),
                "Raw Data-1".to_string(),
                "Raw Data-2".to_string()
            ])
        );
        assert!(!group.output("Image1").unwrap().is_ready());
        assert!(!group.output("Image2").unwrap().is_ready());
        assert_eq!(group.output("ImageGroup").unwrap().len(), 2);
        let name = group.output("ImageName").unwrap().value().unwrap();
        assert_eq!(name.as_str(), Some("raw"));

        datasets
            .at(1)
            .unwrap()
            .set_value(Value::object(DatasetInfo::preloaded(tagged_ramp(&[6, 7], "yx"))))
            .unwrap();
        let mask = group.output("Image1").unwrap();
        assert!(mask.is_ready());
        assert_eq!(mask.meta().channel_names, Some(vec!["Prediction Mask".to_string()]));
    }

    #[test]
    fn test_multi_lane_selection_adds_lanes_with_shared_settings() {
        let graph = Graph::with_defaults().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let (_factory, registry, info) =
            file_dataset(dir.path(), "lane.npy", tagged_ramp(&[12, 14], "yx"));
        let lanes = multi_lane_data_selection(&graph, registry, tczyx()).unwrap();
        lanes
            .input("WorkingDirectory")
            .unwrap()
            .set_value(dir.path().to_str().unwrap())
            .unwrap();
        lanes
            .input("DatasetRoles")
            .unwrap()
            .set_value(dataset_roles(&["Raw Data"]))
            .unwrap();

        lanes.input("DatasetGroup").unwrap().resize(2).unwrap();
        assert_eq!(lanes.len(), 2);
        for lane in 0..2 {
            assert_eq!(lanes.input("DatasetGroup").unwrap().at(lane).unwrap().len(), 1);
        }

        lanes
            .input("DatasetGroup")
            .unwrap()
            .at(1)
            .unwrap()
            .at(0)
            .unwrap()
            .set_value(Value::object(info))
            .unwrap();

        let images = lanes.output("Image").unwrap();
        assert_eq!(images.len(), 2);
        assert!(!images.at(0).unwrap().is_ready());
        assert_eq!(images.at(1).unwrap().meta().shape, Some(vec![1, 1, 1, 12, 14]));

        lanes.input("DatasetGroup").unwrap().resize(1).unwrap();
        assert_eq!(lanes.len(), 1);
        assert_eq!(lanes.output("Image").unwrap().len(), 1);
    }

    #[test]
    fn test_replacing_the_dataset_dirties_downstream() {
        let graph = Graph::with_defaults().unwrap();
        let node = selection(&graph, Arc::new(ProviderRegistry::new()), tczyx(), Path::new("/"));
        node.input("Dataset")
            .unwrap()
            .set_value(Value::object(DatasetInfo::preloaded(tagged_ramp(&[4, 5], "yx"))))
            .unwrap();

        let follower = Node::new(&graph, OpArrayPiper::new()).unwrap();
        follower
            .input("Input")
            .unwrap()
            .connect(&node.output("Image").unwrap())
            .unwrap();

        let image_dirty = Arc::new(Mutex::new(Vec::new()));
        let sink = image_dirty.clone();
        node.output("Image")
            .unwrap()
            .notify_dirty(move |_, roi| sink.lock().push(roi.clone()));
        let follower_dirty = Arc::new(Mutex::new(Vec::new()));
        let sink = follower_dirty.clone();
        follower
            .output("Output")
            .unwrap()
            .notify_dirty(move |_, roi| sink.lock().push(roi.clone()));

        let zeros = TaggedArray::tagged(
            ArrayData::from_shape_vec(&[4, 5], vec![0u8; 20]).unwrap(),
            AxisTags::from_keys("yx").unwrap(),
        );
        node.input("Dataset")
            .unwrap()
            .set_value(Value::object(DatasetInfo::preloaded(zeros)))
            .unwrap();

        let full = Roi::full(&[1, 1, 1, 4, 5]);
        assert_eq!(image_dirty.lock().last(), Some(&full));
        assert_eq!(follower_dirty.lock().last(), Some(&full));

        let data = follower.output("Output").unwrap().get(&full).wait().unwrap();
        assert_eq!(data.as_array::<u8>().unwrap().iter().copied().max(), Some(0));
    }

    #[test]
    fn test_lane_dataset_groups_mirror_every_role() {
        let graph = Graph::with_defaults().unwrap();
        let lanes =
            multi_lane_data_selection(&graph, Arc::new(ProviderRegistry::new()), tczyx()).unwrap();
        lanes
            .input("WorkingDirectory")
            .unwrap()
            .set_value("/")
            .unwrap();
        lanes
            .input("DatasetRoles")
            .unwrap()
            .set_value(dataset_roles(&["Raw Data", "Prediction Mask"]))
            .unwrap();
        lanes.input("DatasetGroup").unwrap().resize(1).unwrap();

        let outer = lanes.input("DatasetGroup").unwrap().at(0).unwrap();
        let inner = lanes.lane(0).unwrap().input("DatasetGroup").unwrap();
        assert_eq!(outer.len(), 2);
        assert_eq!(inner.len(), outer.len());
        assert!(inner.partner().is_some_and(|p| p.ptr_eq(&outer)));
        for role in 0..2 {
            let sub = inner.at(role).unwrap();
            assert!(sub.partner().is_some_and(|p| p.ptr_eq(&outer.at(role).unwrap())));
        }

        outer
            .at(1)
            .unwrap()
            .set_value(Value::object(DatasetInfo::preloaded(tagged_ramp(&[6, 7], "yx"))))
            .unwrap();
        let mask = lanes.lane(0).unwrap().output("Image1").unwrap();
        assert_eq!(mask.meta().shape, Some(vec![1, 1, 1, 6, 7]));
        assert!(!lanes.lane(0).unwrap().output("Image").unwrap().is_ready());
    }
}
