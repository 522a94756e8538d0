use thiserror::Error;

/// Errors surfaced by the viewer core.
#[derive(Debug, Error)]
pub enum RendererError {
    /// No usable adapter, device or surface. Fatal before the frame loop starts.
    #[error("GPU setup failed: {0}")]
    Setup(String),

    /// Structural problem in the mesh source; no partial mesh is produced.
    #[error("malformed mesh on line {line}: {reason}")]
    MalformedMesh { line: usize, reason: String },

    /// The mesh does not fit the 16-bit index buffer format.
    #[error(
        "mesh has {vertex_count} vertices and {index_count} indices but 16-bit index buffers hold at most {max}"
    )]
    IndexOverflow {
        vertex_count: usize,
        index_count: usize,
        max: usize,
    },

    /// A write-once uniform was written a second time.
    #[error("{0} uniform is write-once and has already been written")]
    UniformAlreadyWritten(&'static str),

    #[error("pass recorded outside of a frame")]
    FrameNotStarted,

    #[error("surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),
}

impl RendererError {
    pub(crate) fn malformed(line: usize, reason: impl Into<String>) -> Self {
        Self::MalformedMesh {
            line,
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = RendererError> = std::result::Result<T, E>;
