//! Renderable objects: a named set of object passes plus object-wide values.
//!
//! Passes and placeholders live in one flat map keyed by pass name. Sub-pass
//! lists only hold names into that map, so a parent never owns its children and
//! nothing points back at the object.

use std::collections::HashMap;
use std::fmt;

use crate::error::{RenderError, RenderResult, ResourceKind};
use crate::values::{BindOutcome, BindScope, InputRegistry, SharedValue, ValueStore};

use super::object_pass::{ObjectPass, PassBinding, RenderContext};

enum PassSlot {
    /// Named as a parent by a sub-pass before the pass itself was added.
    Placeholder,
    Ready(Box<ObjectPass>),
}

pub struct RenderableObject {
    name: String,
    registry: InputRegistry,
    passes: HashMap<String, PassSlot>,
    sub_passes: HashMap<String, Vec<String>>,
    parents: HashMap<String, String>,
    values: ValueStore,
    warn_on_shadowed: bool,
}

impl RenderableObject {
    pub fn new(name: &str, registry: InputRegistry) -> Self {
        Self {
            name: name.to_string(),
            values: ValueStore::new(registry.clone()),
            registry,
            passes: HashMap::new(),
            sub_passes: HashMap::new(),
            parents: HashMap::new(),
            warn_on_shadowed: true,
        }
    }

    /// Whether a dropped object-wide write is logged at `warn`.
    pub fn with_shadow_warnings(mut self, enabled: bool) -> Self {
        self.warn_on_shadowed = enabled;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a pass, optionally as a sub-pass that runs right after `parent`.
    ///
    /// A missing parent is created as a placeholder and filled in when a pass of
    /// that name is added later. Every object-wide value the new pass declares is
    /// bound to it as a shadowable value.
    pub(crate) fn add_pass(
        &mut self,
        name: &str,
        binding: PassBinding,
        parent: Option<&str>,
    ) -> RenderResult<()> {
        if let Some(PassSlot::Ready(_)) = self.passes.get(name) {
            return Err(RenderError::duplicate(ResourceKind::ObjectPass, name));
        }
        if let Some(parent) = parent {
            if self.is_ancestor_or_self(name, parent) {
                return Err(RenderError::SubPassCycle {
                    object: self.name.clone(),
                    pass: name.to_string(),
                    parent: parent.to_string(),
                });
            }
        }

        let mut pass = ObjectPass::new(name, binding, self.registry.clone())?;
        for (value_name, value) in self.values.iter() {
            if pass.declares(value_name) {
                pass.add_value(value_name, value.clone(), BindScope::ObjectWide)?;
            }
        }

        if let Some(parent) = parent {
            self.passes
                .entry(parent.to_string())
                .or_insert(PassSlot::Placeholder);
            self.sub_passes
                .entry(parent.to_string())
                .or_default()
                .push(name.to_string());
            self.parents.insert(name.to_string(), parent.to_string());
        }

        let filled = matches!(self.passes.get(name), Some(PassSlot::Placeholder));
        self.passes
            .insert(name.to_string(), PassSlot::Ready(Box::new(pass)));
        log::debug!(
            "Object '{}': added pass '{}'{}{}",
            self.name,
            name,
            parent.map(|p| format!(" after '{p}'")).unwrap_or_default(),
            if filled { " (placeholder filled)" } else { "" }
        );
        Ok(())
    }

    /// Whether `candidate` is `pass` itself or one of its ancestors.
    fn is_ancestor_or_self(&self, candidate: &str, pass: &str) -> bool {
        let mut current = Some(pass);
        while let Some(name) = current {
            if name == candidate {
                return true;
            }
            current = self.parents.get(name).map(String::as_str);
        }
        false
    }

    /// Remove a pass together with all of its sub-passes.
    ///
    /// Returns the names of every pass removed, `name` first. A placeholder is not
    /// a pass and fails with `NotFound`; it goes away with its last sub-pass.
    pub(crate) fn remove_pass(&mut self, name: &str) -> RenderResult<Vec<String>> {
        if !self.has_pass(name) {
            return Err(RenderError::not_found(ResourceKind::ObjectPass, name));
        }

        if let Some(parent) = self.parents.remove(name) {
            let now_empty = match self.sub_passes.get_mut(&parent) {
                Some(siblings) => {
                    siblings.retain(|sibling| sibling != name);
                    siblings.is_empty()
                }
                None => false,
            };
            if now_empty {
                self.sub_passes.remove(&parent);
                if let Some(PassSlot::Placeholder) = self.passes.get(&parent) {
                    self.passes.remove(&parent);
                }
            }
        }

        let mut removed = Vec::new();
        let mut stack = vec![name.to_string()];
        while let Some(current) = stack.pop() {
            self.passes.remove(&current);
            self.parents.remove(&current);
            if let Some(children) = self.sub_passes.remove(&current) {
                stack.extend(children.into_iter().rev());
            }
            removed.push(current);
        }

        log::debug!("Object '{}': removed passes {:?}", self.name, removed);
        Ok(removed)
    }

    /// Whether a fully constructed pass named `name` exists.
    pub fn has_pass(&self, name: &str) -> bool {
        matches!(self.passes.get(name), Some(PassSlot::Ready(_)))
    }

    pub fn is_placeholder(&self, name: &str) -> bool {
        matches!(self.passes.get(name), Some(PassSlot::Placeholder))
    }

    pub fn pass(&self, name: &str) -> RenderResult<&ObjectPass> {
        match self.passes.get(name) {
            Some(PassSlot::Ready(pass)) => Ok(&**pass),
            _ => Err(RenderError::not_found(ResourceKind::ObjectPass, name)),
        }
    }

    pub fn pass_mut(&mut self, name: &str) -> RenderResult<&mut ObjectPass> {
        match self.passes.get_mut(name) {
            Some(PassSlot::Ready(pass)) => Ok(&mut **pass),
            _ => Err(RenderError::not_found(ResourceKind::ObjectPass, name)),
        }
    }

    /// Names of all constructed passes, sub-passes included.
    pub fn pass_names(&self) -> impl Iterator<Item = &str> {
        self.passes.iter().filter_map(|(name, slot)| match slot {
            PassSlot::Ready(_) => Some(name.as_str()),
            PassSlot::Placeholder => None,
        })
    }

    /// Sub-passes of `parent`, in the order they run.
    pub fn sub_passes(&self, parent: &str) -> &[String] {
        self.sub_passes
            .get(parent)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Set an object-wide value and push it into every pass that declares it.
    ///
    /// Passes holding a pass-local value of the same name keep it. Their names are
    /// returned, sorted.
    pub fn add_value(&mut self, name: &str, value: SharedValue) -> RenderResult<Vec<String>> {
        self.values.update(name, value.clone())?;

        let mut shadowed = Vec::new();
        for (pass_name, slot) in &mut self.passes {
            let PassSlot::Ready(pass) = slot else {
                continue;
            };
            if !pass.declares(name) {
                continue;
            }
            let outcome = pass.add_value(name, value.clone(), BindScope::ObjectWide)?;
            if outcome == BindOutcome::Shadowed {
                if self.warn_on_shadowed {
                    log::warn!(
                        "Object '{}': object-wide '{}' ignored by pass '{}', which binds its own value",
                        self.name,
                        name,
                        pass_name
                    );
                }
                shadowed.push(pass_name.clone());
            }
        }

        shadowed.sort_unstable();
        Ok(shadowed)
    }

    /// Remove an object-wide value, unbinding it from every pass that received it
    /// from this object.
    pub fn remove_value(&mut self, name: &str) -> RenderResult<SharedValue> {
        let value = self.values.remove(name)?;
        for slot in self.passes.values_mut() {
            if let PassSlot::Ready(pass) = slot {
                pass.remove_object_wide_value(name);
            }
        }
        Ok(value)
    }

    pub fn value(&self, name: &str) -> Option<&SharedValue> {
        self.values.try_get(name)
    }

    pub fn values(&self) -> &ValueStore {
        &self.values
    }

    /// Bind a value on one pass. It takes precedence over object-wide values.
    pub fn add_pass_value(
        &mut self,
        pass: &str,
        name: &str,
        value: SharedValue,
    ) -> RenderResult<()> {
        self.pass_mut(pass)?
            .add_value(name, value, BindScope::PassLocal)?;
        Ok(())
    }

    pub fn remove_pass_value(&mut self, pass: &str, name: &str) -> RenderResult<SharedValue> {
        self.pass_mut(pass)?.remove_value(name)
    }

    /// Render pass `name`, then its sub-passes in the order they were added.
    pub fn render_pass(&mut self, name: &str, ctx: &mut RenderContext<'_>) -> RenderResult<()> {
        match self.passes.get_mut(name) {
            Some(PassSlot::Ready(pass)) => pass.render(&self.name, ctx)?,
            _ => return Err(RenderError::not_found(ResourceKind::ObjectPass, name)),
        }

        let children = self.sub_passes.get(name).cloned().unwrap_or_default();
        for child in &children {
            self.render_pass(child, ctx)?;
        }
        Ok(())
    }
}

impl fmt::Debug for RenderableObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut passes: Vec<_> = self.pass_names().collect();
        passes.sort_unstable();
        f.debug_struct("RenderableObject")
            .field("name", &self.name)
            .field("passes", &passes)
            .field("sub_passes", &self.sub_passes)
            .field("values", &self.values.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use glam::{Mat4, Vec3, Vec4};

    use super::*;
    use crate::backend::{
        DummyBackend, PrimitiveTopology, ShaderStage, UniformLocation, VertexFormat,
    };
    use crate::resources::{IndexBuffer, IndexData, ReleaseQueue, VertexBuffer, VertexLayout};
    use crate::shader::{ShaderProgram, ShaderReflection};
    use crate::values::{PassScopeStore, TaggedValue, ValueType};

    fn binding(backend: &mut DummyBackend, inputs: &[(&str, ValueType)]) -> PassBinding {
        let release = ReleaseQueue::new();
        let mut reflection =
            ShaderReflection::new().with_attribute("position", 0, VertexFormat::Float32x3);
        for (slot, (name, ty)) in inputs.iter().enumerate() {
            reflection = reflection.with_input(name, UniformLocation::slot(slot as u32), *ty);
        }
        let program = ShaderProgram::create(
            backend,
            &release,
            "S",
            &[(String::new(), ShaderStage::Vertex)],
            reflection,
        )
        .unwrap();
        let layout = VertexLayout::packed(&[("position", VertexFormat::Float32x3)]);
        PassBinding {
            program,
            vertex_buffer: VertexBuffer::create(backend, &release, "v", &[0u8; 12], layout)
                .unwrap(),
            index_buffer: IndexBuffer::create(backend, &release, "i", &IndexData::U32(vec![0]))
                .unwrap(),
            topology: PrimitiveTopology::PointList,
        }
    }

    fn color_and_transform(backend: &mut DummyBackend) -> PassBinding {
        binding(
            backend,
            &[("color", ValueType::Vec4), ("transform", ValueType::Mat4)],
        )
    }

    #[test]
    fn test_duplicate_pass() {
        let mut backend = DummyBackend::new();
        let mut object = RenderableObject::new("O", InputRegistry::new());
        object
            .add_pass("P", color_and_transform(&mut backend), None)
            .unwrap();
        let err = object
            .add_pass("P", color_and_transform(&mut backend), None)
            .unwrap_err();
        assert!(matches!(
            err,
            RenderError::Duplicate {
                kind: ResourceKind::ObjectPass,
                ..
            }
        ));
    }

    #[test]
    fn test_object_wide_value_reaches_existing_and_new_passes() {
        let mut backend = DummyBackend::new();
        let mut object = RenderableObject::new("O", InputRegistry::new());
        object
            .add_pass("P1", color_and_transform(&mut backend), None)
            .unwrap();

        let m = Mat4::from_translation(Vec3::X);
        let shadowed = object
            .add_value("transform", TaggedValue::shared(m))
            .unwrap();
        assert!(shadowed.is_empty());

        object
            .add_pass("P2", color_and_transform(&mut backend), None)
            .unwrap();
        for pass in ["P1", "P2"] {
            let entry = object.pass(pass).unwrap().bound_value("transform").unwrap();
            assert_eq!(entry.value.get::<Mat4>().unwrap(), m);
            assert!(!entry.locked);
        }
    }

    #[test]
    fn test_pass_local_value_wins_over_object_wide() {
        let mut backend = DummyBackend::new();
        let mut object = RenderableObject::new("O", InputRegistry::new());
        object
            .add_pass("P", color_and_transform(&mut backend), None)
            .unwrap();
        object
            .add_pass_value("P", "color", TaggedValue::shared(Vec4::X))
            .unwrap();

        let shadowed = object
            .add_value("color", TaggedValue::shared(Vec4::Y))
            .unwrap();
        assert_eq!(shadowed, ["P"]);
        let entry = object.pass("P").unwrap().bound_value("color").unwrap();
        assert_eq!(entry.value.get::<Vec4>().unwrap(), Vec4::X);
        assert!(entry.locked);
    }

    #[test]
    fn test_object_wide_value_skips_passes_without_the_input() {
        let mut backend = DummyBackend::new();
        let mut object = RenderableObject::new("O", InputRegistry::new());
        object
            .add_pass("P", binding(&mut backend, &[("color", ValueType::Vec4)]), None)
            .unwrap();
        object
            .add_value("time", TaggedValue::shared(1.0f32))
            .unwrap();
        assert!(object.pass("P").unwrap().bound_value("time").is_none());
        assert!(object.value("time").is_some());
    }

    #[test]
    fn test_remove_object_wide_value() {
        let mut backend = DummyBackend::new();
        let mut object = RenderableObject::new("O", InputRegistry::new());
        object
            .add_pass("P", color_and_transform(&mut backend), None)
            .unwrap();
        object
            .add_value("transform", TaggedValue::shared(Mat4::IDENTITY))
            .unwrap();
        object.remove_value("transform").unwrap();
        assert!(object.pass("P").unwrap().is_unsatisfied("transform"));
        assert!(object.remove_value("transform").is_err());
    }

    #[test]
    fn test_sub_pass_creates_and_fills_placeholder() {
        let mut backend = DummyBackend::new();
        let mut object = RenderableObject::new("O", InputRegistry::new());
        object
            .add_pass("outline", color_and_transform(&mut backend), Some("main"))
            .unwrap();
        assert!(object.is_placeholder("main"));
        assert!(!object.has_pass("main"));
        assert!(object.pass("main").is_err());

        object
            .add_pass("main", color_and_transform(&mut backend), None)
            .unwrap();
        assert!(object.has_pass("main"));
        assert_eq!(object.sub_passes("main"), ["outline"]);
    }

    #[test]
    fn test_sub_pass_cycle_rejected() {
        let mut backend = DummyBackend::new();
        let mut object = RenderableObject::new("O", InputRegistry::new());
        object
            .add_pass("b", color_and_transform(&mut backend), Some("a"))
            .unwrap();
        let err = object
            .add_pass("a", color_and_transform(&mut backend), Some("b"))
            .unwrap_err();
        assert!(matches!(err, RenderError::SubPassCycle { .. }));
        let err = object
            .add_pass("c", color_and_transform(&mut backend), Some("c"))
            .unwrap_err();
        assert!(matches!(err, RenderError::SubPassCycle { .. }));
    }

    #[test]
    fn test_remove_pass_removes_sub_passes() {
        let mut backend = DummyBackend::new();
        let mut object = RenderableObject::new("O", InputRegistry::new());
        object
            .add_pass("main", color_and_transform(&mut backend), None)
            .unwrap();
        object
            .add_pass("outline", color_and_transform(&mut backend), Some("main"))
            .unwrap();
        object
            .add_pass("glow", color_and_transform(&mut backend), Some("outline"))
            .unwrap();

        let removed = object.remove_pass("main").unwrap();
        assert_eq!(removed, ["main", "outline", "glow"]);
        assert_eq!(object.pass_names().count(), 0);

        let pass_scope = PassScopeStore::new(InputRegistry::new());
        let system = ValueStore::new(InputRegistry::new());
        let mut ctx = RenderContext {
            backend: &mut backend,
            pass_scope: &pass_scope,
            system: &system,
        };
        let err = object.render_pass("main", &mut ctx).unwrap_err();
        assert!(matches!(err, RenderError::NotFound { .. }));
    }

    #[test]
    fn test_removing_last_sub_pass_drops_placeholder() {
        let mut backend = DummyBackend::new();
        let mut object = RenderableObject::new("O", InputRegistry::new());
        object
            .add_pass("outline", color_and_transform(&mut backend), Some("main"))
            .unwrap();
        let err = object.remove_pass("main").unwrap_err();
        assert!(matches!(err, RenderError::NotFound { .. }));
        assert!(object.is_placeholder("main"));
        assert!(object.has_pass("outline"));

        object.remove_pass("outline").unwrap();
        assert!(!object.is_placeholder("main"));
        assert!(object.remove_pass("main").is_err());
    }
}
