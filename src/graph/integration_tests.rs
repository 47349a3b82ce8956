// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

/// Integration tests for slot wiring, configuration and teardown
#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::sync::Arc;

    use parking_lot::Mutex;

    use crate::array::{ArrayData, Roi, TaggedArray, Value};
    use crate::errors::{ExecutionError, GraphError};
    use crate::graph::{ExecuteContext, Graph, Node, Phase, SetupContext, Slot, SlotSpec, SlotType};
    use crate::metadata::AxisTags;
    use crate::operators::stub::OpScale;
    use crate::operators::{OpArrayPiper, OpReorderAxes};
    use crate::traits::Operator;

    /// Summarizes the shapes of a leveled input as text.
    struct OpShapes;

    impl Operator for OpShapes {
        fn name(&self) -> &'static str {
            "OpShapes"
        }

        fn slots(&self) -> Vec<SlotSpec> {
            vec![
                SlotSpec::input("Images").level(1),
                SlotSpec::output("Summary").of_type(SlotType::String),
            ]
        }

        fn setup_outputs(&mut self, ctx: &mut SetupContext) -> Result<(), GraphError> {
            let shapes: Vec<String> = ctx
                .input("Images")?
                .subslots()
                .iter()
                .map(|s| format!("{:?}", s.meta().shape.clone().unwrap_or_default()))
                .collect();
            ctx.publish_value("Summary", shapes.join(";"))
        }

        fn execute(&self, _: &ExecuteContext, slot: &Slot, _: &Roi) -> Result<ArrayData, ExecutionError> {
            Err(ExecutionError::Internal(slot.qualified_name()))
        }

        fn propagate_dirty(&self, _: &Node, _: &Slot, _: &Roi) -> Result<(), GraphError> {
            Ok(())
        }
    }

    fn floats(shape: &[usize]) -> TaggedArray {
        let n: usize = shape.iter().product();
        TaggedArray::new(ArrayData::from_shape_vec(shape, (0..n).map(|i| i as f64).collect()).unwrap())
    }

    fn u8s(shape: &[usize], keys: &str) -> TaggedArray {
        let n: usize = shape.iter().product();
        TaggedArray::tagged(
            ArrayData::from_shape_vec(shape, vec![0u8; n]).unwrap(),
            AxisTags::from_keys(keys).unwrap(),
        )
    }

    fn summary(node: &Node) -> String {
        node.output("Summary")
            .unwrap()
            .value()
            .unwrap()
            .as_str()
            .unwrap()
            .to_string()
    }

    #[test]
    fn test_outputs_follow_input_readiness() {
        let graph = Graph::with_defaults().unwrap();
        let scale = Node::new(&graph, OpScale).unwrap();
        let output = scale.output("Output").unwrap();

        scale.input("Input").unwrap().set_value(floats(&[2, 2])).unwrap();
        assert!(!output.is_ready());
        assert_eq!(scale.phase(), Phase::Unconfigured);

        scale.input("Factor").unwrap().set_value(Value::object(3.0f64)).unwrap();
        assert!(output.is_ready());
        let data = output.get(&Roi::full(&[2, 2])).wait().unwrap();
        assert_eq!(data.as_array::<f64>().unwrap().iter().copied().collect::<Vec<_>>(), vec![0.0, 3.0, 6.0, 9.0]);

        scale.input("Input").unwrap().disconnect().unwrap();
        assert!(!output.is_ready());
        assert!(matches!(
            output.get(&Roi::full(&[2, 2])).wait(),
            Err(ExecutionError::NotReady { .. })
        ));
    }

    #[test]
    fn test_chained_operators_propagate_metadata() {
        let graph = Graph::with_defaults().unwrap();
        let source = Node::new(&graph, OpArrayPiper::new()).unwrap();
        let scale = Node::new(&graph, OpScale).unwrap();
        scale.input("Factor").unwrap().set_value(Value::object(2.0f64)).unwrap();
        scale.input("Input").unwrap().connect(&source.output("Output").unwrap()).unwrap();
        assert!(!scale.output("Output").unwrap().is_ready());

        source.input("Input").unwrap().set_value(floats(&[3, 4])).unwrap();
        let meta = scale.output("Output").unwrap().meta();
        assert_eq!(meta.shape, Some(vec![3, 4]));
        assert_eq!(meta.axis_keys().as_deref(), Some("yx"));

        let region = scale
            .output("Output")
            .unwrap()
            .get(&Roi::new(vec![1, 1], vec![2, 3]))
            .wait()
            .unwrap();
        assert_eq!(region.as_array::<f64>().unwrap().iter().copied().collect::<Vec<_>>(), vec![10.0, 12.0]);
    }

    #[test]
    fn test_failed_connect_restores_previous_upstream() {
        let graph = Graph::with_defaults().unwrap();
        let plane = Node::new(&graph, OpArrayPiper::new()).unwrap();
        plane.input("Input").unwrap().set_value(u8s(&[4, 5], "yx")).unwrap();
        let volume = Node::new(&graph, OpArrayPiper::new()).unwrap();
        volume.input("Input").unwrap().set_value(u8s(&[3, 4, 5], "zyx")).unwrap();

        let reorder = Node::new(&graph, OpReorderAxes::new()).unwrap();
        reorder.input("AxisOrder").unwrap().set_value("yxc").unwrap();
        let input = reorder.input("Input").unwrap();
        input.connect(&plane.output("Output").unwrap()).unwrap();
        assert_eq!(reorder.output("Output").unwrap().meta().shape, Some(vec![4, 5, 1]));

        let err = input.connect(&volume.output("Output").unwrap()).unwrap_err();
        assert!(matches!(err, GraphError::Configuration { .. }));
        assert!(input.partner().unwrap().ptr_eq(&plane.output("Output").unwrap()));
        assert_eq!(reorder.output("Output").unwrap().meta().shape, Some(vec![4, 5, 1]));
        assert!(reorder.is_ready());
    }

    #[test]
    fn test_type_and_level_mismatches_are_rejected() {
        let graph = Graph::with_defaults().unwrap();
        let piper = Node::new(&graph, OpArrayPiper::new()).unwrap();
        let shapes = Node::new(&graph, OpShapes).unwrap();

        let err = piper.input("Input").unwrap().set_value("text").unwrap_err();
        assert!(matches!(err, GraphError::TypeMismatch { .. }));

        let err = shapes.input("Images").unwrap().set_value(floats(&[1])).unwrap_err();
        assert!(matches!(err, GraphError::LevelMismatch { expected: 0, found: 1, .. }));

        let err = piper
            .input("Input")
            .unwrap()
            .connect(&shapes.input("Images").unwrap())
            .unwrap_err();
        assert!(matches!(err, GraphError::LevelMismatch { .. }));

        let err = piper.input("Nope").unwrap_err();
        assert!(matches!(err, GraphError::UnknownSlot { .. }));
    }

    #[test]
    fn test_leveled_inputs_track_sub_slots() {
        let graph = Graph::with_defaults().unwrap();
        let shapes = Node::new(&graph, OpShapes).unwrap();
        let images = shapes.input("Images").unwrap();
        assert_eq!(summary(&shapes), "");

        images.resize(2).unwrap();
        assert_eq!(images.len(), 2);
        assert!(!shapes.output("Summary").unwrap().is_ready());

        images.at(0).unwrap().set_value(floats(&[2, 3])).unwrap();
        images.at(1).unwrap().set_value(floats(&[4])).unwrap();
        assert_eq!(summary(&shapes), "[2, 3];[4]");

        images.insert_slot(0).unwrap();
        assert_eq!(images.len(), 3);
        assert_eq!(images.at(1).unwrap().index(), Some(1));
        assert!(!shapes.output("Summary").unwrap().is_ready());

        images.remove_slot(0).unwrap();
        images.resize(1).unwrap();
        assert_eq!(summary(&shapes), "[2, 3]");

        let err = images.at(5).unwrap_err();
        assert!(matches!(err, GraphError::IndexOutOfRange { index: 5, len: 1, .. }));
    }

    #[test]
    fn test_shrinking_keeps_leading_sub_slots_and_releases_the_rest() {
        let graph = Graph::with_defaults().unwrap();
        let shapes = Node::new(&graph, OpShapes).unwrap();
        let images = shapes.input("Images").unwrap();
        images.resize(3).unwrap();
        for index in 0..3 {
            images.at(index).unwrap().set_value(floats(&[index + 1])).unwrap();
        }
        let kept = images.subslots();
        assert_eq!(kept[2].qualified_name(), "OpShapes.Images[2]");

        let reader = Node::new(&graph, OpArrayPiper::new()).unwrap();
        reader.input("Input").unwrap().connect(&kept[2]).unwrap();
        assert!(reader.output("Output").unwrap().is_ready());

        images.resize(1).unwrap();
        assert_eq!(images.len(), 1);
        assert!(images.at(0).unwrap().ptr_eq(&kept[0]));
        assert_eq!(images.at(0).unwrap().meta().shape, Some(vec![1]));
        assert!(kept[1].is_detached());
        assert!(kept[2].is_detached());
        assert!(!reader.input("Input").unwrap().is_connected());
        assert!(!reader.output("Output").unwrap().is_ready());
        assert_eq!(summary(&shapes), "[1]");

        images.resize(2).unwrap();
        assert!(images.at(0).unwrap().ptr_eq(&kept[0]));
        assert!(!images.at(1).unwrap().ptr_eq(&kept[1]));
    }

    #[test]
    fn test_leveled_followers_mirror_their_upstream() {
        let graph = Graph::with_defaults().unwrap();
        let upstream = Node::new(&graph, OpShapes).unwrap();
        let follower = Node::new(&graph, OpShapes).unwrap();
        let source = upstream.input("Images").unwrap();
        let mirror = follower.input("Images").unwrap();

        source.resize(1).unwrap();
        source.at(0).unwrap().set_value(floats(&[7])).unwrap();
        mirror.connect(&source).unwrap();
        assert_eq!(mirror.len(), 1);
        assert_eq!(summary(&follower), "[7]");

        source.insert_slot(1).unwrap();
        assert_eq!(mirror.len(), 2);
        source.at(1).unwrap().set_value(floats(&[8, 9])).unwrap();
        assert_eq!(summary(&follower), "[7];[8, 9]");

        // Resizing a follower of an input resizes the upstream.
        mirror.resize(3).unwrap();
        assert_eq!(source.len(), 3);
        assert_eq!(mirror.len(), 3);

        source.remove_slot(0).unwrap();
        assert_eq!(mirror.len(), 2);
        assert_eq!(mirror.at(0).unwrap().meta().shape, Some(vec![8, 9]));

        mirror.disconnect().unwrap();
        assert_eq!(mirror.len(), 0);
        source.resize(4).unwrap();
        assert_eq!(mirror.len(), 0);
    }

    #[test]
    fn test_dirty_regions_flow_downstream() {
        let graph = Graph::with_defaults().unwrap();
        let source = Node::new(&graph, OpArrayPiper::new()).unwrap();
        let scale = Node::new(&graph, OpScale).unwrap();
        source.input("Input").unwrap().set_value(floats(&[10, 10])).unwrap();
        scale.input("Factor").unwrap().set_value(Value::object(1.5f64)).unwrap();
        scale.input("Input").unwrap().connect(&source.output("Output").unwrap()).unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        scale
            .output("Output")
            .unwrap()
            .notify_dirty(move |_, roi| sink.lock().push(roi.clone()));

        let roi = Roi::new(vec![2, 2], vec![4, 6]);
        source.input("Input").unwrap().set_dirty(&roi).unwrap();
        scale.input("Factor").unwrap().set_value(Value::object(2.5f64)).unwrap();

        let seen = seen.lock();
        assert_eq!(seen.first(), Some(&roi));
        assert_eq!(seen.last(), Some(&Roi::full(&[10, 10])));
    }

    #[test]
    fn test_clean_up_releases_children_and_followers() {
        let graph = Graph::with_defaults().unwrap();
        let parent = Node::new(&graph, OpArrayPiper::new()).unwrap();
        let first = Node::new_child(&parent, OpArrayPiper::new()).unwrap();
        let second = Node::new_child(&parent, OpArrayPiper::new()).unwrap();
        let downstream = Node::new(&graph, OpArrayPiper::new()).unwrap();
        parent.input("Input").unwrap().set_value(floats(&[3])).unwrap();
        downstream.input("Input").unwrap().connect(&parent.output("Output").unwrap()).unwrap();
        assert!(downstream.is_ready());
        assert_eq!(graph.nodes().len(), 4);
        assert_eq!(parent.children(), vec![first.clone(), second.clone()]);

        parent.clean_up();
        assert!(parent.is_torn_down());
        assert!(first.is_torn_down());
        assert!(second.is_torn_down());
        assert!(!downstream.is_ready());
        assert!(!downstream.input("Input").unwrap().is_connected());
        assert_eq!(graph.nodes(), vec![downstream.clone()]);

        // Torn down nodes refuse new wiring.
        assert!(parent.input("Input").unwrap().set_value(floats(&[3])).is_err());
        assert!(Node::new_child(&parent, OpArrayPiper::new()).is_err());

        graph.clean_up();
        assert!(graph.nodes().is_empty());
    }

    #[test]
    fn test_requests_deliver_results_to_callbacks() {
        let graph = Graph::with_defaults().unwrap();
        let piper = Node::new(&graph, OpArrayPiper::new()).unwrap();
        piper.input("Input").unwrap().set_value(floats(&[4, 4])).unwrap();

        let (tx, rx) = mpsc::channel();
        piper
            .output("Output")
            .unwrap()
            .get(&Roi::new(vec![0, 0], vec![2, 2]))
            .notify_finished(move |data| {
                let _ = tx.send(data.shape());
            });
        assert_eq!(rx.recv().unwrap(), vec![2, 2]);
    }

    #[tokio::test]
    async fn test_requests_can_be_awaited() {
        let graph = Graph::with_defaults().unwrap();
        let scale = Node::new(&graph, OpScale).unwrap();
        scale.input("Input").unwrap().set_value(floats(&[2])).unwrap();
        scale.input("Factor").unwrap().set_value(Value::object(-1.0f64)).unwrap();

        let data = scale
            .output("Output")
            .unwrap()
            .get(&Roi::full(&[2]))
            .wait_async()
            .await
            .unwrap();
        assert_eq!(data.as_array::<f64>().unwrap().iter().copied().collect::<Vec<_>>(), vec![0.0, -1.0]);
    }
}
