//! Activation capture and hook registration.

use std::collections::HashMap;

use burn::prelude::*;
use camrs_core::ForwardHooks;

/// Captured activations from model layers.
#[derive(Debug, Clone)]
pub struct ActivationCapture<B: Backend, const D: usize> {
    /// Activations by layer name.
    activations: HashMap<String, Tensor<B, D>>,
}

impl<B: Backend, const D: usize> ActivationCapture<B, D> {
    /// Create a new activation capture.
    pub fn new() -> Self {
        Self {
            activations: HashMap::new(),
        }
    }

    /// Store an activation, replacing any earlier one for the same layer.
    pub fn store(&mut self, name: &str, activation: Tensor<B, D>) {
        self.activations.insert(name.to_string(), activation);
    }

    /// Get an activation by name.
    pub fn get(&self, name: &str) -> Option<&Tensor<B, D>> {
        self.activations.get(name)
    }

    /// Get all layer names.
    pub fn names(&self) -> Vec<&str> {
        self.activations.keys().map(|s| s.as_str()).collect()
    }

    /// Clear all stored activations.
    pub fn clear(&mut self) {
        self.activations.clear();
    }
}

impl<B: Backend, const D: usize> Default for ActivationCapture<B, D> {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle returned when a hook is registered, used to remove it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookHandle(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
enum HookTarget {
    Input,
    Layer(String),
}

/// Hooks registered against a model, and what they captured.
///
/// The registry is the [`ForwardHooks`] observer handed to
/// [`CamModel::forward_hooked`](camrs_core::CamModel::forward_hooked). While
/// enabled it keeps the latest model input (if an input hook is registered)
/// and the latest output of every hooked layer. While disabled, forward
/// passes leave the captured state untouched.
///
/// # Example
///
/// ```rust,ignore
/// let mut hooks = HookRegistry::new();
/// let handle = hooks.register_forward_hook("block3");
/// model.forward_hooked(x, &mut hooks);
/// let act = hooks.activation("block3").unwrap();
/// hooks.remove(handle);
/// ```
#[derive(Debug, Clone)]
pub struct HookRegistry<B: Backend, const D: usize> {
    next_id: u64,
    hooks: Vec<(HookHandle, HookTarget)>,
    enabled: bool,
    input: Option<Tensor<B, D>>,
    capture: ActivationCapture<B, D>,
}

impl<B: Backend, const D: usize> HookRegistry<B, D> {
    /// Create an empty, enabled registry.
    pub fn new() -> Self {
        Self {
            next_id: 0,
            hooks: Vec::new(),
            enabled: true,
            input: None,
            capture: ActivationCapture::new(),
        }
    }

    fn register(&mut self, target: HookTarget) -> HookHandle {
        let handle = HookHandle(self.next_id);
        self.next_id += 1;
        self.hooks.push((handle, target));
        handle
    }

    /// Register a hook storing the model input.
    pub fn register_input_hook(&mut self) -> HookHandle {
        self.register(HookTarget::Input)
    }

    /// Register a hook storing the output of `layer`.
    pub fn register_forward_hook(&mut self, layer: &str) -> HookHandle {
        self.register(HookTarget::Layer(layer.to_string()))
    }

    /// Remove a hook. Returns `false` if the handle was not registered.
    pub fn remove(&mut self, handle: HookHandle) -> bool {
        let before = self.hooks.len();
        self.hooks.retain(|(h, _)| *h != handle);
        self.hooks.len() != before
    }

    /// Remove every hook.
    pub fn remove_all(&mut self) {
        self.hooks.clear();
    }

    /// Number of registered hooks.
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Check whether no hook is registered.
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Whether forward passes update the captured state.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enable or disable capture, returning the previous state.
    pub fn set_enabled(&mut self, enabled: bool) -> bool {
        std::mem::replace(&mut self.enabled, enabled)
    }

    /// The last captured model input.
    pub fn input(&self) -> Option<&Tensor<B, D>> {
        self.input.as_ref()
    }

    /// The last captured output of `layer`.
    pub fn activation(&self, layer: &str) -> Option<&Tensor<B, D>> {
        self.capture.get(layer)
    }

    /// Names of layers with a captured activation.
    pub fn captured_layers(&self) -> Vec<&str> {
        self.capture.names()
    }

    /// Drop everything captured so far. Registered hooks stay in place.
    pub fn clear(&mut self) {
        self.input = None;
        self.capture.clear();
    }

    fn hooks_input(&self) -> bool {
        self.hooks.iter().any(|(_, t)| *t == HookTarget::Input)
    }

    fn hooks_layer(&self, layer: &str) -> bool {
        self.hooks
            .iter()
            .any(|(_, t)| matches!(t, HookTarget::Layer(name) if name == layer))
    }
}

impl<B: Backend, const D: usize> Default for HookRegistry<B, D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend, const D: usize> ForwardHooks<B, D> for HookRegistry<B, D> {
    fn pre_forward(&mut self, input: &Tensor<B, D>) {
        if self.enabled && self.hooks_input() {
            self.input = Some(input.clone());
        }
    }

    fn forward(&mut self, layer: &str, output: &Tensor<B, D>) {
        if self.enabled && self.hooks_layer(layer) {
            self.capture.store(layer, output.clone());
        }
    }
}
