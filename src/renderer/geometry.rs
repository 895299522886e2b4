use crate::asset::{Buffer, Handle};
use crate::graphics::{PrimitiveType, VertexStream};

/// Read-only description of one drawable geometry range: its vertex streams,
/// index buffer, and the index/vertex window a draw call covers.
#[derive(Debug, Clone)]
pub struct Geometry {
    streams: Vec<VertexStream>,
    index_buffer: Handle<Buffer>,
    primitive_type: PrimitiveType,
    index_start: u32,
    index_count: u32,
    vertex_start: u32,
    vertex_count: u32,
}

impl Geometry {
    pub fn new(
        streams: Vec<VertexStream>,
        index_buffer: Handle<Buffer>,
        primitive_type: PrimitiveType,
        index_start: u32,
        index_count: u32,
        vertex_start: u32,
        vertex_count: u32,
    ) -> Self {
        Self {
            streams,
            index_buffer,
            primitive_type,
            index_start,
            index_count,
            vertex_start,
            vertex_count,
        }
    }

    pub fn streams(&self) -> &[VertexStream] {
        &self.streams
    }

    pub fn index_buffer(&self) -> Handle<Buffer> {
        self.index_buffer
    }

    pub fn primitive_type(&self) -> PrimitiveType {
        self.primitive_type
    }

    pub fn index_start(&self) -> u32 {
        self.index_start
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn vertex_start(&self) -> u32 {
        self.vertex_start
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }
}
