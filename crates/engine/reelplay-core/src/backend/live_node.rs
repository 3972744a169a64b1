//! Backend that projects element state onto persistent output nodes.
//!
//! Each element owns one [`OutputNode`] on the stage, keyed by element id.
//! Node identity survives reloads; nodes whose element disappears from a
//! later load are removed.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use hashbrown::HashSet;

use crate::backend::{Backend, BackendKind, Transport};
use crate::clock::{FrameClock, TickerId};
use crate::config::EngineConfig;
use crate::events::{EngineEvent, Listener};
use crate::model::{AnimationElement, ElementType, TimelineData};
use crate::playback::{PlaybackPhase, PlaybackState};
use crate::props::{PropKey, PropValue, PropertyBag};
use crate::stage::{OutputNode, Stage};

pub struct LiveNodeBackend {
    me: Weak<LiveNodeBackend>,
    clock: FrameClock,
    ticker: Cell<Option<TickerId>>,
    stage: RefCell<Option<Stage>>,
    /// Element ids whose nodes this backend created.
    owned: RefCell<HashSet<String>>,
    transport: Transport,
}

impl LiveNodeBackend {
    pub fn new(clock: &FrameClock, config: &EngineConfig) -> Rc<Self> {
        Rc::new_cyclic(|me| Self {
            me: me.clone(),
            clock: clock.clone(),
            ticker: Cell::new(None),
            stage: RefCell::new(None),
            owned: RefCell::new(HashSet::new()),
            transport: Transport::new(config.easing()),
        })
    }

    /// Number of nodes this backend currently owns.
    pub fn node_count(&self) -> usize {
        self.owned.borrow().len()
    }

    fn stage(&self) -> Option<Stage> {
        self.stage.borrow().clone()
    }

    fn tick(&self, dt: f64) {
        if self.transport.is_destroyed() {
            return;
        }
        let step = self.transport.step(dt);
        if step.advanced {
            self.project();
        }
        self.transport.finish(step);
    }

    /// Write every element's live state to its node.
    fn project(&self) {
        let Some(stage) = self.stage() else {
            return;
        };
        let scene = self.transport.scene();
        for element in &scene.elements {
            if let Some(bag) = scene.states.get(&element.id) {
                self.write_node(&stage, element, bag);
            }
        }
    }

    fn write_node(&self, stage: &Stage, element: &AnimationElement, props: &PropertyBag) {
        let updated = stage.update_node(&element.id, |node| apply_props(node, element, props));
        if updated.is_none() {
            let mut node = OutputNode::new(element.id.clone());
            apply_props(&mut node, element, props);
            stage.insert_node(node);
        }
        self.owned.borrow_mut().insert(element.id.clone());
    }

    /// Remove nodes for elements that are no longer part of the scene.
    fn reconcile(&self, stage: &Stage, elements: &[AnimationElement]) {
        let keep: HashSet<&str> = elements.iter().map(|e| e.id.as_str()).collect();
        let mut owned = self.owned.borrow_mut();
        owned.retain(|id| {
            if keep.contains(id.as_str()) {
                return true;
            }
            log::debug!("removing node for dropped element {id}");
            stage.remove_node(id);
            false
        });
    }
}

fn px(value: &PropValue) -> String {
    match value {
        PropValue::Number(_) => format!("{}px", value.to_css()),
        other => other.to_css(),
    }
}

/// `zIndex` -> `z-index`. Names already in kebab-case pass through.
fn style_name(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for ch in key.chars() {
        if ch.is_ascii_uppercase() {
            out.push('-');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Map a property bag onto node styles.
pub fn apply_props(node: &mut OutputNode, element: &AnimationElement, props: &PropertyBag) {
    node.style
        .insert("position".to_string(), "absolute".to_string());
    let mut transform = Vec::new();
    for (key, value) in props.iter() {
        match key {
            PropKey::X => {
                node.style.insert("left".into(), px(value));
            }
            PropKey::Y => {
                node.style.insert("top".into(), px(value));
            }
            PropKey::Width | PropKey::Height => {
                node.style.insert(key.name().to_string(), px(value));
            }
            PropKey::BorderRadius => {
                node.style.insert("border-radius".into(), px(value));
            }
            PropKey::Opacity => {
                node.style.insert("opacity".into(), value.to_css());
            }
            PropKey::Fill if element.kind == ElementType::Text => {
                node.style.insert("color".into(), value.to_css());
            }
            PropKey::Fill => {
                node.style.insert("background-color".into(), value.to_css());
            }
            PropKey::BackgroundColor => {
                // an explicit fill wins
                if element.kind == ElementType::Text || !props.contains(&PropKey::Fill) {
                    node.style.insert("background-color".into(), value.to_css());
                }
            }
            PropKey::Color => {
                node.style.insert("color".into(), value.to_css());
            }
            PropKey::Rotation => transform.push(format!("rotate({}deg)", value.to_css())),
            PropKey::Scale => transform.push(format!("scale({})", value.to_css())),
            PropKey::Text => node.text = Some(value.to_css()),
            PropKey::Font => {
                node.style.insert("font".into(), value.to_css());
            }
            other => {
                node.style.insert(style_name(other.name()), value.to_css());
            }
        }
    }
    if !transform.is_empty() {
        node.style.insert("transform".into(), transform.join(" "));
    }
    if element.kind == ElementType::Text && node.text.is_none() {
        node.text = Some(element.name.clone());
    }
}

impl Backend for LiveNodeBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Dom
    }

    fn init(&self, stage: &Stage) -> crate::Result<()> {
        *self.stage.borrow_mut() = Some(stage.clone());
        if self.ticker.get().is_none() && !self.transport.is_destroyed() {
            let me = self.me.clone();
            let id = self.clock.add(Rc::new(move |dt: f64| {
                if let Some(backend) = me.upgrade() {
                    backend.tick(dt);
                }
            }));
            self.ticker.set(Some(id));
        }
        Ok(())
    }

    fn load_timeline(
        &self,
        timeline: &TimelineData,
        elements: &[AnimationElement],
    ) -> crate::Result<()> {
        let stage = self.stage().ok_or(crate::EngineError::AdapterNotInitialized)?;
        self.reconcile(&stage, elements);
        for element in elements {
            self.write_node(&stage, element, &element.initial_props);
        }
        self.transport.load(timeline, elements);
        self.seek(0.0);
        Ok(())
    }

    fn render_static_element(
        &self,
        element: &AnimationElement,
        stage: &Stage,
    ) -> crate::Result<()> {
        self.write_node(stage, element, &element.initial_props);
        Ok(())
    }

    fn play(&self) {
        self.transport.play(&|| self.project());
    }

    fn pause(&self) {
        self.transport.pause();
    }

    fn seek(&self, time: f64) {
        self.transport.seek(time, &|| self.project());
    }

    fn set_rate(&self, rate: f64) {
        self.transport.set_rate(rate);
    }

    fn playback_state(&self) -> PlaybackState {
        self.transport.state()
    }

    fn phase(&self) -> PlaybackPhase {
        self.transport.phase()
    }

    fn on(&self, event: EngineEvent, listener: Listener) {
        self.transport.events().on(event, listener);
    }

    fn off(&self, event: EngineEvent, listener: &Listener) -> bool {
        self.transport.events().off(event, listener)
    }

    fn set_perspective(&self, value: Option<&PropValue>, stage: &Stage) {
        stage.set_perspective(value.map(px));
    }

    fn element_state(&self, element_id: &str) -> Option<PropertyBag> {
        self.transport.element_state(element_id)
    }

    fn destroy(&self) {
        if let Some(id) = self.ticker.take() {
            self.clock.remove(id);
        }
        if let Some(stage) = self.stage.borrow_mut().take() {
            for id in self.owned.borrow_mut().drain() {
                stage.remove_node(&id);
            }
        }
        self.owned.borrow_mut().clear();
        if !self.transport.is_destroyed() {
            log::debug!("live-node backend destroyed");
        }
        self.transport.destroy();
    }

    fn is_destroyed(&self) -> bool {
        self.transport.is_destroyed()
    }
}
