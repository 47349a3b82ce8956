// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Typed connection points of operators.
//!
//! A [`Slot`] belongs to exactly one operator. It either holds a value
//! directly, follows one upstream slot, carries metadata published by its
//! operator (computed outputs), or is empty. Leveled slots (`level > 0`) hold
//! an ordered, resizable list of sub-slots one level down.
//!
//! # Change propagation
//!
//! Every mutation recomputes the slot's readiness and metadata and then
//! propagates the change in this order:
//!
//! 1. ready / unready / meta-changed listeners of the slot, in registration order
//! 2. the owning operator's reconfiguration (top-level inputs only)
//! 3. every downstream slot following this one
//! 4. the parent slot, for sub-slots
//!
//! Configuration errors raised anywhere along the way are collected and the
//! first one is returned to the caller. `set_value` and level-0 `connect`
//! restore the previous source when that happens, so the graph returns to
//! its prior configuration.
//!
//! No slot lock is ever held while calling out to listeners, operators or
//! other slots.

use parking_lot::Mutex;
use std::fmt::{Debug, Display, Formatter};
use std::sync::{Arc, Weak};
use tokio_util::sync::CancellationToken;

use super::node::{Node, NodeInner};
use super::signal::{ListenerId, Signal};
use crate::array::{Roi, TaggedArray, Value};
use crate::engine::Request;
use crate::errors::{ExecutionError, GraphError};
use crate::metadata::{DefaultAxisOrders, MetaDict};
use crate::observability::messages::graph::{
    ChangeRolledBack, ListenerFailed, SlotConnected, SlotResized,
};
use crate::observability::messages::StructuredLog;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Input,
    Output,
}

/// Declared kind of value a slot carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotType {
    Array,
    String,
    Bool,
    /// Opaque object; compatible with every other type.
    Object,
}

impl SlotType {
    pub fn accepts(&self, other: SlotType) -> bool {
        *self == other || *self == SlotType::Object || other == SlotType::Object
    }
}

impl Display for SlotType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SlotType::Array => "array",
            SlotType::String => "string",
            SlotType::Bool => "bool",
            SlotType::Object => "object",
        };
        f.write_str(name)
    }
}

/// Declaration of one slot of an operator.
///
/// ```ignore
/// vec![
///     SlotSpec::input("Input"),
///     SlotSpec::input("AxisOrder").of_type(SlotType::String).default_value("tczyx"),
///     SlotSpec::input("DatasetGroup").of_type(SlotType::Object).level(1).optional(),
///     SlotSpec::output("Output"),
/// ]
/// ```
#[derive(Debug, Clone)]
pub struct SlotSpec {
    pub name: String,
    pub direction: Direction,
    pub stype: SlotType,
    pub level: usize,
    pub optional: bool,
    pub default: Option<Value>,
}

impl SlotSpec {
    pub fn input(name: &str) -> Self {
        Self {
            name: name.to_string(),
            direction: Direction::Input,
            stype: SlotType::Array,
            level: 0,
            optional: false,
            default: None,
        }
    }

    pub fn output(name: &str) -> Self {
        Self {
            direction: Direction::Output,
            ..Self::input(name)
        }
    }

    pub fn of_type(mut self, stype: SlotType) -> Self {
        self.stype = stype;
        self
    }

    pub fn level(mut self, level: usize) -> Self {
        self.level = level;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }
}

type ReadyCallback = dyn Fn(&Slot) + Send + Sync;
type DirtyCallback = dyn Fn(&Slot, &Roi) + Send + Sync;
type ResizeCallback = dyn Fn(&Slot, usize, usize) -> Result<(), GraphError> + Send + Sync;

#[derive(Default)]
struct SlotSignals {
    ready: Signal<ReadyCallback>,
    unready: Signal<ReadyCallback>,
    meta_changed: Signal<ReadyCallback>,
    dirty: Signal<DirtyCallback>,
    inserted: Signal<ResizeCallback>,
    removed: Signal<ResizeCallback>,
}

impl SlotSignals {
    fn clear(&self) {
        self.ready.clear();
        self.unready.clear();
        self.meta_changed.clear();
        self.dirty.clear();
        self.inserted.clear();
        self.removed.clear();
    }
}

#[derive(Clone)]
enum Source {
    None,
    Value(Value),
    Partner(Slot),
    /// Metadata published by the owning operator; data comes from `execute`.
    Computed,
}

/// Listener registrations that keep a leveled follower the same length as its upstream.
struct Mirror {
    upstream: Weak<SlotInner>,
    inserted: ListenerId,
    removed: ListenerId,
}

struct SlotState {
    source: Source,
    ready: bool,
    meta: Arc<MetaDict>,
    downstream: Vec<Weak<SlotInner>>,
    subslots: Vec<Slot>,
    index: Option<usize>,
    mirror: Option<Mirror>,
    detached: bool,
}

pub(crate) struct SlotInner {
    name: String,
    direction: Direction,
    stype: SlotType,
    level: usize,
    optional: bool,
    owner: Weak<NodeInner>,
    parent: Weak<SlotInner>,
    state: Mutex<SlotState>,
    signals: SlotSignals,
}

/// Shared handle to a slot. Clones refer to the same slot.
#[derive(Clone)]
pub struct Slot(pub(crate) Arc<SlotInner>);

impl PartialEq for Slot {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Slot {}

impl Debug for Slot {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Slot")
            .field("name", &self.qualified_name())
            .field("level", &self.0.level)
            .field("ready", &self.is_ready())
            .finish()
    }
}

/// Previous source and metadata, kept so a failed change can be reverted.
struct Snapshot {
    source: Source,
    meta: Arc<MetaDict>,
}

fn record(first: &mut Option<GraphError>, result: Result<(), GraphError>) {
    if let Err(e) = result {
        if first.is_none() {
            *first = Some(e);
        }
    }
}

fn finish(first: Option<GraphError>) -> Result<(), GraphError> {
    match first {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

impl Slot {
    pub(crate) fn new(spec: &SlotSpec, owner: Weak<NodeInner>) -> Slot {
        Slot(Arc::new(SlotInner {
            name: spec.name.clone(),
            direction: spec.direction,
            stype: spec.stype,
            level: spec.level,
            optional: spec.optional,
            owner,
            parent: Weak::new(),
            state: Mutex::new(SlotState {
                source: Source::None,
                // An empty leveled slot is vacuously ready.
                ready: spec.level > 0,
                meta: Arc::new(MetaDict::default()),
                downstream: Vec::new(),
                subslots: Vec::new(),
                index: None,
                mirror: None,
                detached: false,
            }),
            signals: SlotSignals::default(),
        }))
    }

    fn new_subslot(&self, index: usize) -> Slot {
        let level = self.0.level - 1;
        Slot(Arc::new(SlotInner {
            name: self.0.name.clone(),
            direction: self.0.direction,
            stype: self.0.stype,
            level,
            optional: self.0.optional,
            owner: self.0.owner.clone(),
            parent: Arc::downgrade(&self.0),
            state: Mutex::new(SlotState {
                source: Source::None,
                ready: level > 0,
                meta: Arc::new(MetaDict::default()),
                downstream: Vec::new(),
                subslots: Vec::new(),
                index: Some(index),
                mirror: None,
                detached: false,
            }),
            signals: SlotSignals::default(),
        }))
    }

    // ----- attributes ---------------------------------------------------

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn direction(&self) -> Direction {
        self.0.direction
    }

    pub fn stype(&self) -> SlotType {
        self.0.stype
    }

    pub fn level(&self) -> usize {
        self.0.level
    }

    pub fn is_optional(&self) -> bool {
        self.0.optional
    }

    /// Position inside the parent slot, for sub-slots.
    pub fn index(&self) -> Option<usize> {
        self.0.state.lock().index
    }

    pub fn owner(&self) -> Option<Node> {
        self.0.owner.upgrade().map(Node)
    }

    pub fn parent(&self) -> Option<Slot> {
        self.0.parent.upgrade().map(Slot)
    }

    /// `Operator.Slot[i][j]`, for diagnostics.
    pub fn qualified_name(&self) -> String {
        match (self.parent(), self.index()) {
            (Some(parent), Some(index)) => format!("{}[{}]", parent.qualified_name(), index),
            _ => {
                let owner = self
                    .0
                    .owner
                    .upgrade()
                    .map(|n| n.name().to_string())
                    .unwrap_or_else(|| "<detached>".to_string());
                format!("{}.{}", owner, self.0.name)
            }
        }
    }

    pub fn ptr_eq(&self, other: &Slot) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn is_ready(&self) -> bool {
        self.0.state.lock().ready
    }

    /// Current metadata snapshot. Empty while the slot is not ready.
    pub fn meta(&self) -> Arc<MetaDict> {
        self.0.state.lock().meta.clone()
    }

    pub fn partner(&self) -> Option<Slot> {
        match &self.0.state.lock().source {
            Source::Partner(p) => Some(p.clone()),
            _ => None,
        }
    }

    pub fn has_value(&self) -> bool {
        matches!(self.0.state.lock().source, Source::Value(_))
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.0.state.lock().source, Source::Partner(_))
    }

    pub(crate) fn is_computed(&self) -> bool {
        matches!(self.0.state.lock().source, Source::Computed)
    }

    pub(crate) fn is_detached(&self) -> bool {
        self.0.state.lock().detached
    }

    /// Number of sub-slots. Always zero for level-0 slots.
    pub fn len(&self) -> usize {
        self.0.state.lock().subslots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn subslot(&self, index: usize) -> Option<Slot> {
        self.0.state.lock().subslots.get(index).cloned()
    }

    /// Sub-slot `index`, or an error naming the slot and its length.
    pub fn at(&self, index: usize) -> Result<Slot, GraphError> {
        let len = self.len();
        self.subslot(index).ok_or_else(|| GraphError::IndexOutOfRange {
            slot: self.qualified_name(),
            index,
            len,
        })
    }

    pub fn subslots(&self) -> Vec<Slot> {
        self.0.state.lock().subslots.clone()
    }

    /// Slots currently following this one.
    pub fn downstream(&self) -> Vec<Slot> {
        let mut st = self.0.state.lock();
        st.downstream.retain(|w| w.strong_count() > 0);
        st.downstream
            .iter()
            .filter_map(|w| w.upgrade().map(Slot))
            .collect()
    }

    // ----- listener registration ------------------------------------------

    pub fn notify_ready(&self, f: impl Fn(&Slot) + Send + Sync + 'static) -> ListenerId {
        self.0.signals.ready.connect(Arc::new(f))
    }

    pub fn notify_unready(&self, f: impl Fn(&Slot) + Send + Sync + 'static) -> ListenerId {
        self.0.signals.unready.connect(Arc::new(f))
    }

    pub fn notify_meta_changed(&self, f: impl Fn(&Slot) + Send + Sync + 'static) -> ListenerId {
        self.0.signals.meta_changed.connect(Arc::new(f))
    }

    pub fn notify_dirty(&self, f: impl Fn(&Slot, &Roi) + Send + Sync + 'static) -> ListenerId {
        self.0.signals.dirty.connect(Arc::new(f))
    }

    /// Called with `(slot, index, new_len)` after a sub-slot was inserted.
    pub fn notify_inserted(
        &self,
        f: impl Fn(&Slot, usize, usize) -> Result<(), GraphError> + Send + Sync + 'static,
    ) -> ListenerId {
        self.0.signals.inserted.connect(Arc::new(f))
    }

    /// Called with `(slot, index, new_len)` after a sub-slot was removed.
    pub fn notify_removed(
        &self,
        f: impl Fn(&Slot, usize, usize) -> Result<(), GraphError> + Send + Sync + 'static,
    ) -> ListenerId {
        self.0.signals.removed.connect(Arc::new(f))
    }

    /// Remove a listener registered with any of the `notify_*` methods.
    pub fn unregister(&self, id: ListenerId) -> bool {
        let s = &self.0.signals;
        s.ready.disconnect(id)
            || s.unready.disconnect(id)
            || s.meta_changed.disconnect(id)
            || s.dirty.disconnect(id)
            || s.inserted.disconnect(id)
            || s.removed.disconnect(id)
    }

    // ----- wiring -----------------------------------------------------------

    /// Store `value` directly, replacing any connection.
    ///
    /// Triggers reconfiguration of everything downstream and then a full
    /// dirty notification. If reconfiguration fails the previous source is
    /// restored and the error is returned.
    pub fn set_value(&self, value: impl Into<Value>) -> Result<(), GraphError> {
        let value = value.into();
        self.ensure_attached()?;
        if self.0.level > 0 {
            return Err(GraphError::LevelMismatch {
                slot: self.qualified_name(),
                expected: 0,
                found: self.0.level,
            });
        }
        if self.0.stype != SlotType::Object && value.stype() != self.0.stype {
            return Err(GraphError::TypeMismatch {
                slot: self.qualified_name(),
                expected: self.0.stype.to_string(),
                found: value.stype().to_string(),
            });
        }
        let meta = Arc::new(self.value_meta(&value)?);
        let previous = self.replace_source(Source::Value(value), Some(meta));

        if let Err(e) = self.update() {
            self.roll_back(previous, &e);
            return Err(e);
        }
        self.set_dirty_all()
    }

    /// Follow `upstream`. Both slots must have the same level and compatible types.
    ///
    /// Leveled followers mirror the upstream's sub-slots: same length, each
    /// sub-slot connected to its counterpart, and later inserts and removals
    /// on the upstream repeated here.
    pub fn connect(&self, upstream: &Slot) -> Result<(), GraphError> {
        self.connect_with(upstream, true)
    }

    /// Like [`Slot::connect`], but a failing downstream setup keeps the
    /// connection. The owner stays in its error phase until reconfigured.
    pub(crate) fn connect_kept(&self, upstream: &Slot) -> Result<(), GraphError> {
        self.connect_with(upstream, false)
    }

    fn connect_with(&self, upstream: &Slot, rollback: bool) -> Result<(), GraphError> {
        self.ensure_attached()?;
        upstream.ensure_attached()?;
        if self.ptr_eq(upstream) {
            return Err(GraphError::InvalidConnection {
                slot: self.qualified_name(),
                reason: "a slot cannot follow itself".to_string(),
            });
        }
        if upstream.level() != self.0.level {
            return Err(GraphError::LevelMismatch {
                slot: self.qualified_name(),
                expected: self.0.level,
                found: upstream.level(),
            });
        }
        if !self.0.stype.accepts(upstream.stype()) {
            return Err(GraphError::TypeMismatch {
                slot: self.qualified_name(),
                expected: self.0.stype.to_string(),
                found: upstream.stype().to_string(),
            });
        }
        if self.partner().is_some_and(|p| p.ptr_eq(upstream)) {
            return Ok(());
        }

        let previous = self.replace_source(Source::Partner(upstream.clone()), None);
        upstream.add_downstream(self);
        SlotConnected {
            slot: &self.qualified_name(),
            upstream: &upstream.qualified_name(),
        }
        .log();

        if self.0.level > 0 {
            let mut first = None;
            record(&mut first, self.attach_mirror(upstream));
            record(&mut first, self.update());
            return finish(first);
        }

        if let Err(e) = self.update() {
            if rollback {
                self.roll_back(previous, &e);
            }
            return Err(e);
        }
        Ok(())
    }

    /// Drop the value or connection. Leveled slots lose all their sub-slots.
    pub fn disconnect(&self) -> Result<(), GraphError> {
        if self.is_detached() {
            return Ok(());
        }
        let mut first = None;
        if self.0.level > 0 {
            self.detach_mirror();
            self.replace_source(Source::None, Some(Arc::new(MetaDict::default())));
            for index in (0..self.len()).rev() {
                record(&mut first, self.remove_slot_internal(index));
            }
            record(&mut first, self.update());
            return finish(first);
        }
        if matches!(self.0.state.lock().source, Source::None) {
            return Ok(());
        }
        self.replace_source(Source::None, Some(Arc::new(MetaDict::default())));
        record(&mut first, self.update());
        finish(first)
    }

    /// Grow or shrink a leveled slot to `n` sub-slots, keeping existing ones by index.
    ///
    /// Shrinking disconnects each trailing sub-slot before removing it. A slot
    /// that follows another input forwards the resize upstream; a slot that
    /// follows an output cannot be resized.
    pub fn resize(&self, n: usize) -> Result<(), GraphError> {
        self.ensure_leveled()?;
        if let Some(upstream) = self.structural_upstream()? {
            return upstream.resize(n);
        }
        let old_len = self.len();
        let mut first = None;
        for index in old_len..n {
            record(&mut first, self.insert_slot_internal(index));
        }
        for index in (n..self.len()).rev() {
            record(&mut first, self.remove_slot_internal(index));
        }
        SlotResized {
            slot: &self.qualified_name(),
            old_len,
            new_len: self.len(),
        }
        .log();
        finish(first)
    }

    pub fn insert_slot(&self, index: usize) -> Result<(), GraphError> {
        self.ensure_leveled()?;
        if let Some(upstream) = self.structural_upstream()? {
            return upstream.insert_slot(index);
        }
        self.insert_slot_internal(index)
    }

    pub fn remove_slot(&self, index: usize) -> Result<(), GraphError> {
        self.ensure_leveled()?;
        if let Some(upstream) = self.structural_upstream()? {
            return upstream.remove_slot(index);
        }
        self.remove_slot_internal(index)
    }

    // ----- data access --------------------------------------------------------

    /// The slot's value. Computed array outputs are evaluated over their full extent.
    pub fn value(&self) -> Result<Value, GraphError> {
        if self.0.level > 0 {
            return Err(GraphError::LevelMismatch {
                slot: self.qualified_name(),
                expected: 0,
                found: self.0.level,
            });
        }
        let (ready, source, meta) = {
            let st = self.0.state.lock();
            (st.ready, st.source.clone(), st.meta.clone())
        };
        if !ready {
            return Err(GraphError::NotReady {
                slot: self.qualified_name(),
            });
        }
        match source {
            Source::Value(v) => Ok(v),
            Source::Partner(p) => p.value(),
            Source::Computed if self.0.stype == SlotType::Array => {
                let shape = meta.shape.clone().unwrap_or_default();
                let data = self.get(&Roi::full(&shape)).wait()?;
                Ok(Value::Array(TaggedArray {
                    data,
                    axistags: meta.axistags.clone(),
                }))
            }
            _ => Err(GraphError::NotReady {
                slot: self.qualified_name(),
            }),
        }
    }

    /// Request the sub-region `roi` of this slot's array.
    ///
    /// Always returns a request; reading a slot that is not ready or a region
    /// outside the slot's shape yields a failed request.
    pub fn get(&self, roi: &Roi) -> Request {
        self.get_with_token(roi, CancellationToken::new())
    }

    pub(crate) fn get_with_token(&self, roi: &Roi, token: CancellationToken) -> Request {
        let graph = self.owner().and_then(|n| n.graph());
        if self.0.level > 0 {
            return Request::failed(ExecutionError::Internal(format!(
                "slot '{}' is leveled; read one of its sub-slots",
                self.qualified_name()
            )));
        }
        let (ready, source, meta) = {
            let st = self.0.state.lock();
            (st.ready, st.source.clone(), st.meta.clone())
        };
        if !ready {
            return Request::failed(ExecutionError::NotReady {
                slot: self.qualified_name(),
            });
        }
        let Some(shape) = meta.shape.clone() else {
            return Request::failed(ExecutionError::Internal(format!(
                "slot '{}' does not carry array data",
                self.qualified_name()
            )));
        };
        if let Err(e) = roi.check_within(&shape) {
            return Request::failed(e);
        }

        match source {
            Source::Partner(p) => p.get_with_token(roi, token),
            Source::Value(Value::Array(array)) => {
                let roi = roi.clone();
                Request::with_token(graph.as_ref(), token, move |_| {
                    array.data.slice(&roi).map(Arc::new)
                })
            }
            Source::Computed => {
                let slot = self.clone();
                let roi = roi.clone();
                Request::with_token(graph.as_ref(), token, move |token| {
                    let node = slot.owner().ok_or_else(|| ExecutionError::NotReady {
                        slot: slot.qualified_name(),
                    })?;
                    node.execute_output(&slot, &roi, &meta, token)
                })
            }
            _ => Request::failed(ExecutionError::Internal(format!(
                "slot '{}' does not carry array data",
                self.qualified_name()
            ))),
        }
    }

    /// Mark `roi` stale and notify everything that depends on it.
    ///
    /// Input slots hand the region to their operator's `propagate_dirty`;
    /// every slot forwards it to the slots following it. Ignored while the
    /// slot is not ready.
    pub fn set_dirty(&self, roi: &Roi) -> Result<(), GraphError> {
        if !self.is_ready() || self.is_detached() {
            return Ok(());
        }
        for listener in self.0.signals.dirty.snapshot() {
            listener(self, roi);
        }
        let mut first = None;
        if self.0.direction == Direction::Input {
            if let Some(owner) = self.owner() {
                record(&mut first, owner.propagate_dirty(self, roi));
            }
        }
        for follower in self.downstream() {
            record(&mut first, follower.set_dirty(roi));
        }
        finish(first)
    }

    /// Mark the whole slot stale.
    pub fn set_dirty_all(&self) -> Result<(), GraphError> {
        let shape = self.meta().shape.clone().unwrap_or_default();
        self.set_dirty(&Roi::full(&shape))
    }

    // ----- internals ------------------------------------------------------------

    /// Store a value without notifying anyone. Used for declared defaults.
    pub(crate) fn init_value(&self, value: Value) -> Result<(), GraphError> {
        let meta = Arc::new(self.value_meta(&value)?);
        let mut st = self.0.state.lock();
        st.source = Source::Value(value);
        st.meta = meta;
        st.ready = true;
        Ok(())
    }

    /// Publish operator-computed metadata on an output.
    pub(crate) fn publish(&self, meta: MetaDict) -> Result<(), GraphError> {
        self.ensure_attached()?;
        self.replace_source(Source::Computed, Some(Arc::new(meta)));
        self.update()
    }

    /// Stop serving computed data.
    pub(crate) fn unpublish(&self) -> Result<(), GraphError> {
        if !self.is_computed() {
            return Ok(());
        }
        self.replace_source(Source::None, Some(Arc::new(MetaDict::default())));
        self.update()
    }

    /// Sever the slot from the graph after its operator was torn down.
    pub(crate) fn detach(&self) {
        let subslots = {
            let mut st = self.0.state.lock();
            st.detached = true;
            st.ready = false;
            st.downstream.clear();
            std::mem::take(&mut st.subslots)
        };
        self.detach_mirror();
        for sub in subslots {
            sub.detach();
        }
        self.0.signals.clear();
    }

    fn ensure_attached(&self) -> Result<(), GraphError> {
        if self.is_detached() {
            let operator = self
                .0
                .owner
                .upgrade()
                .map(|n| n.name().to_string())
                .unwrap_or_default();
            return Err(GraphError::TornDown { operator });
        }
        Ok(())
    }

    fn ensure_leveled(&self) -> Result<(), GraphError> {
        self.ensure_attached()?;
        if self.0.level == 0 {
            return Err(GraphError::LevelMismatch {
                slot: self.qualified_name(),
                expected: 1,
                found: 0,
            });
        }
        Ok(())
    }

    /// The slot structural changes must be applied to instead of this one, if any.
    fn structural_upstream(&self) -> Result<Option<Slot>, GraphError> {
        match self.partner() {
            Some(p) if p.direction() == Direction::Input => Ok(Some(p)),
            Some(_) => Err(GraphError::ResizeFollower {
                slot: self.qualified_name(),
            }),
            None => Ok(None),
        }
    }

    fn graph_axis_orders(&self) -> DefaultAxisOrders {
        self.owner()
            .and_then(|n| n.graph())
            .map(|g| g.config().default_axis_orders.clone())
            .unwrap_or_default()
    }

    fn value_meta(&self, value: &Value) -> Result<MetaDict, GraphError> {
        match value {
            Value::Array(array) => {
                let shape = array.data.shape();
                let axistags = match &array.axistags {
                    Some(tags) => tags.clone(),
                    None => self.graph_axis_orders().tags_for_rank(shape.len())?,
                };
                let meta = MetaDict::for_array(shape, array.data.dtype(), axistags);
                meta.validate()?;
                Ok(meta)
            }
            _ => Ok(MetaDict::default()),
        }
    }

    fn add_downstream(&self, follower: &Slot) {
        self.0
            .state
            .lock()
            .downstream
            .push(Arc::downgrade(&follower.0));
    }

    fn remove_downstream(&self, follower: &Slot) {
        let target = Arc::as_ptr(&follower.0);
        self.0
            .state
            .lock()
            .downstream
            .retain(|w| w.as_ptr() != target && w.strong_count() > 0);
    }

    fn replace_source(&self, source: Source, meta: Option<Arc<MetaDict>>) -> Snapshot {
        let previous = {
            let mut st = self.0.state.lock();
            let old_source = std::mem::replace(&mut st.source, source);
            let old_meta = st.meta.clone();
            if let Some(meta) = meta {
                st.meta = meta;
            }
            Snapshot {
                source: old_source,
                meta: old_meta,
            }
        };
        if let Source::Partner(old) = &previous.source {
            old.remove_downstream(self);
        }
        previous
    }

    fn roll_back(&self, previous: Snapshot, error: &GraphError) {
        ChangeRolledBack {
            slot: &self.qualified_name(),
            error,
        }
        .log();
        if let Source::Partner(p) = &self.0.state.lock().source {
            p.remove_downstream(self);
        }
        let restored_partner = match &previous.source {
            Source::Partner(p) => Some(p.clone()),
            _ => None,
        };
        {
            let mut st = self.0.state.lock();
            st.source = previous.source;
            st.meta = previous.meta;
        }
        if let Some(p) = restored_partner {
            p.add_downstream(self);
        }
        if let Err(e) = self.update() {
            tracing::warn!(
                slot = %self.qualified_name(),
                error = %e,
                "restoring the previous source also failed"
            );
        }
    }

    /// Recompute readiness and metadata from the current source.
    fn derive(&self) -> (bool, Arc<MetaDict>) {
        let st = self.0.state.lock();
        if self.0.level > 0 {
            let subslots = st.subslots.clone();
            let meta = st.meta.clone();
            drop(st);
            return (subslots.iter().all(Slot::is_ready), meta);
        }
        let partner = match &st.source {
            Source::Partner(p) => Some(p.clone()),
            _ => None,
        };
        if let Some(p) = partner {
            drop(st);
            return (p.is_ready(), p.meta());
        }
        match st.source {
            Source::None => (false, Arc::new(MetaDict::default())),
            _ => (true, st.meta.clone()),
        }
    }

    fn update(&self) -> Result<(), GraphError> {
        let (prev_ready, prev_meta) = {
            let st = self.0.state.lock();
            if st.detached {
                return Ok(());
            }
            (st.ready, st.meta.clone())
        };
        let (ready, meta) = self.derive();
        {
            let mut st = self.0.state.lock();
            st.ready = ready;
            st.meta = meta;
        }
        self.changed(prev_ready, &prev_meta)
    }

    fn changed(&self, prev_ready: bool, prev_meta: &Arc<MetaDict>) -> Result<(), GraphError> {
        let (ready, meta) = {
            let st = self.0.state.lock();
            (st.ready, st.meta.clone())
        };
        if ready && !prev_ready {
            for listener in self.0.signals.ready.snapshot() {
                listener(self);
            }
        } else if !ready && prev_ready {
            for listener in self.0.signals.unready.snapshot() {
                listener(self);
            }
        }
        if ready && !Arc::ptr_eq(&meta, prev_meta) && *meta != **prev_meta {
            for listener in self.0.signals.meta_changed.snapshot() {
                listener(self);
            }
        }

        let mut first = None;
        let parent = self.parent();
        if self.0.direction == Direction::Input && parent.is_none() {
            if let Some(owner) = self.owner() {
                record(&mut first, owner.reconfigure());
            }
        }
        for follower in self.downstream() {
            record(&mut first, follower.update());
        }
        if let Some(parent) = parent {
            record(&mut first, parent.update());
        }
        finish(first)
    }

    fn emit_structural(&self, inserted: bool, index: usize, new_len: usize) -> Result<(), GraphError> {
        let (signal, event) = if inserted {
            (&self.0.signals.inserted, "inserted")
        } else {
            (&self.0.signals.removed, "removed")
        };
        let mut first = None;
        for listener in signal.snapshot() {
            if let Err(e) = listener(self, index, new_len) {
                ListenerFailed {
                    slot: &self.qualified_name(),
                    event,
                    error: &e,
                }
                .log();
                record(&mut first, Err(e));
            }
        }
        finish(first)
    }

    fn reindex(subslots: &[Slot]) {
        for (i, sub) in subslots.iter().enumerate() {
            sub.0.state.lock().index = Some(i);
        }
    }

    fn insert_slot_internal(&self, index: usize) -> Result<(), GraphError> {
        let len = self.len();
        if index > len {
            return Err(GraphError::IndexOutOfRange {
                slot: self.qualified_name(),
                index,
                len,
            });
        }
        let sub = self.new_subslot(index);
        let subslots = {
            let mut st = self.0.state.lock();
            st.subslots.insert(index, sub);
            st.subslots.clone()
        };
        Self::reindex(&subslots);

        let mut first = None;
        record(&mut first, self.emit_structural(true, index, len + 1));
        record(&mut first, self.update());
        finish(first)
    }

    fn remove_slot_internal(&self, index: usize) -> Result<(), GraphError> {
        let sub = self.at(index)?;
        let mut first = None;
        record(&mut first, sub.disconnect());
        for follower in sub.downstream() {
            record(&mut first, follower.disconnect());
        }
        let subslots = {
            let mut st = self.0.state.lock();
            if index < st.subslots.len() && st.subslots[index].ptr_eq(&sub) {
                st.subslots.remove(index);
            }
            st.subslots.clone()
        };
        Self::reindex(&subslots);
        sub.detach();

        record(&mut first, self.emit_structural(false, index, subslots.len()));
        record(&mut first, self.update());
        finish(first)
    }

    fn attach_mirror(&self, upstream: &Slot) -> Result<(), GraphError> {
        self.detach_mirror();

        // Listen before syncing: owners may resize the upstream while the
        // sync below reconfigures them.
        let weak = Arc::downgrade(&self.0);
        let inserted = upstream.notify_inserted(move |up, index, _| match weak.upgrade() {
            Some(inner) => {
                let me = Slot(inner);
                if me.len() < up.len() && index <= me.len() {
                    me.mirror_insert(up, index)
                } else {
                    Ok(())
                }
            }
            None => Ok(()),
        });
        let weak = Arc::downgrade(&self.0);
        let removed = upstream.notify_removed(move |up, index, _| match weak.upgrade() {
            Some(inner) => {
                let me = Slot(inner);
                if me.len() > up.len() && index < me.len() {
                    me.remove_slot_internal(index)
                } else {
                    Ok(())
                }
            }
            None => Ok(()),
        });
        self.0.state.lock().mirror = Some(Mirror {
            upstream: Arc::downgrade(&upstream.0),
            inserted,
            removed,
        });

        let mut first = None;
        while self.len() > upstream.len() {
            let before = self.len();
            record(&mut first, self.remove_slot_internal(before - 1));
            if self.len() >= before {
                break;
            }
        }
        for index in 0..self.len().min(upstream.len()) {
            if let (Some(mine), Some(theirs)) = (self.subslot(index), upstream.subslot(index)) {
                record(&mut first, mine.connect(&theirs));
            }
        }
        while self.len() < upstream.len() {
            let before = self.len();
            record(&mut first, self.mirror_insert(upstream, before));
            if self.len() <= before {
                break;
            }
        }
        finish(first)
    }

    fn mirror_insert(&self, upstream: &Slot, index: usize) -> Result<(), GraphError> {
        let mut first = None;
        record(&mut first, self.insert_slot_internal(index));
        if let (Some(mine), Some(theirs)) = (self.subslot(index), upstream.subslot(index)) {
            record(&mut first, mine.connect(&theirs));
        }
        finish(first)
    }

    fn detach_mirror(&self) {
        let mirror = self.0.state.lock().mirror.take();
        if let Some(mirror) = mirror {
            if let Some(upstream) = mirror.upstream.upgrade() {
                upstream.signals.inserted.disconnect(mirror.inserted);
                upstream.signals.removed.disconnect(mirror.removed);
            }
        }
    }
}
