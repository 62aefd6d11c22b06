//! Vertex and index buffers.
//!
//! Both buffer types are cheap `Arc` handles. Passes of any number of objects may
//! share one buffer; the native handle is queued for release when the last
//! clone is dropped (see [`ReleaseQueue`]).

use std::sync::Arc;

use crate::backend::{
    BackendError, BufferHandle, BufferKind, GraphicsBackend, IndexFormat, VertexFormat,
};
use crate::error::RenderResult;
use crate::shader::ShaderAttribute;

use super::release::{PendingRelease, ReleaseQueue};

/// A named attribute inside a vertex.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    pub name: String,
    pub format: VertexFormat,
    /// Byte offset within one vertex.
    pub offset: u64,
}

/// Ordered attribute layout of a vertex buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexLayout {
    /// Bytes between consecutive vertices.
    pub stride: u64,
    pub attributes: Vec<VertexAttribute>,
}

impl VertexLayout {
    /// Create an empty layout with an explicit stride.
    pub fn new(stride: u64) -> Self {
        Self {
            stride,
            attributes: Vec::new(),
        }
    }

    /// Tightly packed layout: offsets follow declaration order, stride is the sum.
    ///
    /// # Example
    ///
    /// ```
    /// use retained_graphics::backend::VertexFormat;
    /// use retained_graphics::resources::VertexLayout;
    ///
    /// let layout = VertexLayout::packed(&[
    ///     ("position", VertexFormat::Float32x3),
    ///     ("uv", VertexFormat::Float32x2),
    /// ]);
    /// assert_eq!(layout.stride, 20);
    /// assert_eq!(layout.attribute("uv").unwrap().offset, 12);
    /// ```
    pub fn packed(attributes: &[(&str, VertexFormat)]) -> Self {
        let mut layout = Self::new(0);
        for (name, format) in attributes {
            let offset = layout.stride;
            layout.stride += format.size();
            layout = layout.with_attribute(*name, *format, offset);
        }
        layout
    }

    pub fn with_attribute(
        mut self,
        name: impl Into<String>,
        format: VertexFormat,
        offset: u64,
    ) -> Self {
        self.attributes.push(VertexAttribute {
            name: name.into(),
            format,
            offset,
        });
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&VertexAttribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Check that every shader attribute is provided with the same format.
    ///
    /// Extra attributes in the layout are allowed. Returns a description of every
    /// problem found.
    pub fn check_compatible(&self, required: &[ShaderAttribute]) -> Result<(), String> {
        let mut problems = Vec::new();
        for attribute in required {
            match self.attribute(&attribute.name) {
                None => problems.push(format!("missing attribute '{}'", attribute.name)),
                Some(provided) if provided.format != attribute.format => problems.push(format!(
                    "attribute '{}' is {:?}, shader expects {:?}",
                    attribute.name, provided.format, attribute.format
                )),
                Some(_) => {}
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems.join("; "))
        }
    }
}

/// Owns a native buffer handle until the last reference goes away.
#[derive(Debug)]
struct NativeBuffer {
    handle: BufferHandle,
    release: ReleaseQueue,
}

impl Drop for NativeBuffer {
    fn drop(&mut self) {
        self.release.push(PendingRelease::Buffer(self.handle));
    }
}

#[derive(Debug)]
struct VertexBufferInner {
    name: String,
    native: NativeBuffer,
    layout: VertexLayout,
    vertex_count: u32,
}

/// Shared handle to vertex data plus its attribute layout.
#[derive(Debug, Clone)]
pub struct VertexBuffer {
    inner: Arc<VertexBufferInner>,
}

impl VertexBuffer {
    /// Upload `data` and wrap the native buffer.
    ///
    /// `data` must hold a whole number of vertices of `layout.stride` bytes.
    pub fn create(
        backend: &mut dyn GraphicsBackend,
        release: &ReleaseQueue,
        name: &str,
        data: &[u8],
        layout: VertexLayout,
    ) -> RenderResult<Self> {
        if layout.stride == 0 || data.len() as u64 % layout.stride != 0 {
            return Err(BackendError::BufferCreationFailed(format!(
                "'{}': {} bytes is not a multiple of the {}-byte stride",
                name,
                data.len(),
                layout.stride
            ))
            .into());
        }

        let handle = backend.create_buffer(BufferKind::Vertex, data)?;
        let vertex_count = (data.len() as u64 / layout.stride) as u32;
        log::debug!(
            "Created vertex buffer '{}' ({} vertices, {} attributes)",
            name,
            vertex_count,
            layout.attributes.len()
        );

        Ok(Self {
            inner: Arc::new(VertexBufferInner {
                name: name.to_string(),
                native: NativeBuffer {
                    handle,
                    release: release.clone(),
                },
                layout,
                vertex_count,
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn handle(&self) -> BufferHandle {
        self.inner.native.handle
    }

    pub fn layout(&self) -> &VertexLayout {
        &self.inner.layout
    }

    pub fn vertex_count(&self) -> u32 {
        self.inner.vertex_count
    }

    /// Number of live references, including this one.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

/// Index data accepted by [`IndexBuffer::create`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexData {
    U16(Vec<u16>),
    U32(Vec<u32>),
}

impl IndexData {
    pub fn format(&self) -> IndexFormat {
        match self {
            IndexData::U16(_) => IndexFormat::Uint16,
            IndexData::U32(_) => IndexFormat::Uint32,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            IndexData::U16(indices) => indices.len(),
            IndexData::U32(indices) => indices.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            IndexData::U16(indices) => bytemuck::cast_slice(indices),
            IndexData::U32(indices) => bytemuck::cast_slice(indices),
        }
    }
}

#[derive(Debug)]
struct IndexBufferInner {
    name: String,
    native: NativeBuffer,
    format: IndexFormat,
    index_count: u32,
}

/// Shared handle to index data.
#[derive(Debug, Clone)]
pub struct IndexBuffer {
    inner: Arc<IndexBufferInner>,
}

impl IndexBuffer {
    pub fn create(
        backend: &mut dyn GraphicsBackend,
        release: &ReleaseQueue,
        name: &str,
        indices: &IndexData,
    ) -> RenderResult<Self> {
        let handle = backend.create_buffer(BufferKind::Index, indices.as_bytes())?;
        log::debug!("Created index buffer '{}' ({} indices)", name, indices.len());

        Ok(Self {
            inner: Arc::new(IndexBufferInner {
                name: name.to_string(),
                native: NativeBuffer {
                    handle,
                    release: release.clone(),
                },
                format: indices.format(),
                index_count: indices.len() as u32,
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn handle(&self) -> BufferHandle {
        self.inner.native.handle
    }

    pub fn format(&self) -> IndexFormat {
        self.inner.format
    }

    pub fn index_count(&self) -> u32 {
        self.inner.index_count
    }

    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

// Buffers may be dropped from closures running on other threads.
static_assertions::assert_impl_all!(VertexBuffer: Send, Sync);
static_assertions::assert_impl_all!(IndexBuffer: Send, Sync);
