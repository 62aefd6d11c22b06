//! Ordered registry of frame passes and the objects drawn in each.

use crate::backend::GraphicsBackend;
use crate::error::{RenderError, RenderResult, ResourceKind};
use crate::resources::NamedPool;

use super::callbacks::PassHook;
use super::object::RenderableObject;
use super::object_pass::RenderContext;

/// A pass that failed during [`PassRegistry::render_all`] without stopping the frame.
#[derive(Debug)]
pub struct PassFailure {
    pub pass: String,
    pub error: RenderError,
}

/// What one call to [`PassRegistry::render_all`] did.
#[derive(Debug, Default)]
pub struct FrameReport {
    /// Registry passes visited, failed ones included.
    pub passes: usize,
    /// Object passes rendered successfully, sub-passes excluded.
    pub objects_rendered: usize,
    pub failures: Vec<PassFailure>,
}

impl FrameReport {
    /// True if no pass failed.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

struct PassEntry {
    name: String,
    members: Vec<String>,
    before: Vec<PassHook>,
    after: Vec<PassHook>,
}

impl PassEntry {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            members: Vec::new(),
            before: Vec::new(),
            after: Vec::new(),
        }
    }
}

/// Passes in draw order, front first.
#[derive(Default)]
pub struct PassRegistry {
    passes: Vec<PassEntry>,
}

impl PassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a pass that draws before every existing pass.
    pub fn add_to_front(&mut self, name: &str) -> RenderResult<()> {
        self.check_unique(name)?;
        self.passes.insert(0, PassEntry::new(name));
        log::debug!("Added pass '{}' at the front", name);
        Ok(())
    }

    /// Insert a pass that draws after every existing pass.
    pub fn add_to_back(&mut self, name: &str) -> RenderResult<()> {
        self.check_unique(name)?;
        self.passes.push(PassEntry::new(name));
        log::debug!("Added pass '{}' at the back", name);
        Ok(())
    }

    fn check_unique(&self, name: &str) -> RenderResult<()> {
        if self.has_pass(name) {
            Err(RenderError::duplicate(ResourceKind::Pass, name))
        } else {
            Ok(())
        }
    }

    pub fn remove(&mut self, name: &str) -> RenderResult<()> {
        let index = self.index_of(name)?;
        self.passes.remove(index);
        log::debug!("Removed pass '{}'", name);
        Ok(())
    }

    pub fn has_pass(&self, name: &str) -> bool {
        self.passes.iter().any(|entry| entry.name == name)
    }

    pub fn is_object_in_pass(&self, pass: &str, object: &str) -> bool {
        self.passes
            .iter()
            .find(|entry| entry.name == pass)
            .is_some_and(|entry| entry.members.iter().any(|member| member == object))
    }

    /// Pass names in draw order.
    pub fn pass_names(&self) -> impl Iterator<Item = &str> {
        self.passes.iter().map(|entry| entry.name.as_str())
    }

    /// Objects drawn in `pass`, in the order they were added.
    pub fn members(&self, pass: &str) -> RenderResult<&[String]> {
        let index = self.index_of(pass)?;
        Ok(&self.passes[index].members)
    }

    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Draw `object` in `pass`. Returns false if it already was a member.
    pub fn add_object(&mut self, pass: &str, object: &str) -> RenderResult<bool> {
        let entry = self.entry_mut(pass)?;
        if entry.members.iter().any(|member| member == object) {
            return Ok(false);
        }
        entry.members.push(object.to_string());
        Ok(true)
    }

    /// Stop drawing `object` in `pass`. Returns false if it was not a member.
    pub fn remove_object(&mut self, pass: &str, object: &str) -> RenderResult<bool> {
        let entry = self.entry_mut(pass)?;
        let before = entry.members.len();
        entry.members.retain(|member| member != object);
        Ok(entry.members.len() != before)
    }

    /// Drop `object` from every pass.
    pub fn remove_object_everywhere(&mut self, object: &str) {
        for entry in &mut self.passes {
            entry.members.retain(|member| member != object);
        }
    }

    pub fn add_before_hook(
        &mut self,
        pass: &str,
        hook: impl FnMut(&str, &mut dyn GraphicsBackend) -> RenderResult<()> + Send + 'static,
    ) -> RenderResult<()> {
        self.entry_mut(pass)?.before.push(Box::new(hook));
        Ok(())
    }

    pub fn add_after_hook(
        &mut self,
        pass: &str,
        hook: impl FnMut(&str, &mut dyn GraphicsBackend) -> RenderResult<()> + Send + 'static,
    ) -> RenderResult<()> {
        self.entry_mut(pass)?.after.push(Box::new(hook));
        Ok(())
    }

    fn index_of(&self, name: &str) -> RenderResult<usize> {
        self.passes
            .iter()
            .position(|entry| entry.name == name)
            .ok_or_else(|| RenderError::not_found(ResourceKind::Pass, name))
    }

    fn entry_mut(&mut self, name: &str) -> RenderResult<&mut PassEntry> {
        let index = self.index_of(name)?;
        Ok(&mut self.passes[index])
    }

    /// Render every pass in order.
    ///
    /// For each pass: before-hooks, every member object's pass of the same name
    /// (with its sub-passes), then after-hooks. A failure skips the rest of that
    /// pass, is logged and recorded in the report, and the next pass proceeds.
    /// Type errors are bugs in the caller and are returned immediately, as is any
    /// failure when `fail_fast` is set.
    pub fn render_all(
        &mut self,
        objects: &mut NamedPool<RenderableObject>,
        ctx: &mut RenderContext<'_>,
        fail_fast: bool,
    ) -> RenderResult<FrameReport> {
        let mut report = FrameReport::default();

        for entry in &mut self.passes {
            report.passes += 1;
            match Self::render_entry(entry, objects, ctx, &mut report) {
                Ok(()) => {}
                Err(error) if fail_fast || error.is_programming_error() => return Err(error),
                Err(error) => {
                    log::error!("Pass '{}' failed: {}", entry.name, error);
                    report.failures.push(PassFailure {
                        pass: entry.name.clone(),
                        error,
                    });
                }
            }
        }

        Ok(report)
    }

    fn render_entry(
        entry: &mut PassEntry,
        objects: &mut NamedPool<RenderableObject>,
        ctx: &mut RenderContext<'_>,
        report: &mut FrameReport,
    ) -> RenderResult<()> {
        for hook in &mut entry.before {
            hook(&entry.name, &mut *ctx.backend)?;
        }

        for member in &entry.members {
            objects.get_mut(member)?.render_pass(&entry.name, ctx)?;
            report.objects_rendered += 1;
        }

        for hook in &mut entry.after {
            hook(&entry.name, &mut *ctx.backend)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for PassRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.passes.iter().map(|entry| (&entry.name, &entry.members)))
            .finish()
    }
}
