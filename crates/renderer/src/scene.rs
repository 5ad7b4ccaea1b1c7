use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use wgpu::naga::ShaderStage;

use crate::compile::{wrap_fragment, NagaCompiler, ProgramCompiler};
use crate::error::RenderError;
use crate::surface::{Surface, SurfaceBackend};
use crate::uniforms::{UniformHandle, UniformState, RESOLUTION_UNIFORM, TIME_UNIFORM};

const IDENTITY: [[f32; 4]; 4] = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

/// Fixed camera; the quad is already in clip space so the transform is identity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    view_projection: [[f32; 4]; 4],
}

impl Camera {
    pub fn fixed() -> Self {
        Self {
            view_projection: IDENTITY,
        }
    }

    pub fn view_projection(&self) -> [[f32; 4]; 4] {
        self.view_projection
    }
}

/// Two triangles covering the canonical `[-1, 1] x [-1, 1]` clip-space square.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadGeometry {
    vertices: [[f32; 2]; 6],
}

impl QuadGeometry {
    pub fn full_screen() -> Self {
        Self {
            vertices: [
                [-1.0, -1.0],
                [1.0, -1.0],
                [1.0, 1.0],
                [-1.0, -1.0],
                [1.0, 1.0],
                [-1.0, 1.0],
            ],
        }
    }

    pub fn vertices(&self) -> &[[f32; 2]; 6] {
        &self.vertices
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertices.len() as u32
    }
}

/// Which field of the uniform state a binding reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformSlot {
    Time,
    Resolution,
}

/// Named program input bound to a uniform slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UniformBinding {
    pub name: String,
    pub slot: UniformSlot,
}

/// `u_time` and `u_resolution`.
pub fn default_bindings() -> Vec<UniformBinding> {
    vec![
        UniformBinding {
            name: TIME_UNIFORM.to_string(),
            slot: UniformSlot::Time,
        },
        UniformBinding {
            name: RESOLUTION_UNIFORM.to_string(),
            slot: UniformSlot::Resolution,
        },
    ]
}

/// Fragment program bound to the live uniform state.
#[derive(Debug, Clone)]
pub struct Material {
    source: String,
    wrapped: String,
    bindings: Vec<UniformBinding>,
    uniforms: UniformHandle,
    fingerprint: u64,
}

impl Material {
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Program after the uniform prologue has been applied.
    pub fn wrapped_source(&self) -> &str {
        &self.wrapped
    }

    pub fn bindings(&self) -> &[UniformBinding] {
        &self.bindings
    }

    pub fn uniforms(&self) -> &UniformHandle {
        &self.uniforms
    }

    /// Stable identity of the compiled program, used to key GPU pipelines.
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }
}

/// Immutable scene topology built once at start-up.
#[derive(Debug, Clone)]
pub struct Scene {
    camera: Camera,
    geometry: QuadGeometry,
    material: Material,
}

impl Scene {
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn geometry(&self) -> &QuadGeometry {
        &self.geometry
    }

    pub fn material(&self) -> &Material {
        &self.material
    }
}

/// Builds the scene for `fragment_source` and hands back the live uniform handle.
pub fn assemble(
    fragment_source: &str,
    initial_resolution: (u32, u32),
) -> Result<(Scene, UniformHandle), RenderError> {
    assemble_with(&NagaCompiler, fragment_source, initial_resolution)
}

/// Like [`assemble`] with an explicit front-end compiler.
pub fn assemble_with<C>(
    compiler: &C,
    fragment_source: &str,
    initial_resolution: (u32, u32),
) -> Result<(Scene, UniformHandle), RenderError>
where
    C: ProgramCompiler + ?Sized,
{
    let bindings = default_bindings();
    let wrapped = wrap_fragment(fragment_source, &bindings);
    compiler.check(&wrapped, ShaderStage::Fragment)?;

    let uniforms = UniformHandle::new(UniformState::new(initial_resolution)?);
    let mut hasher = DefaultHasher::new();
    wrapped.hash(&mut hasher);
    bindings.hash(&mut hasher);
    let fingerprint = hasher.finish();

    tracing::debug!(
        fingerprint,
        width = initial_resolution.0,
        height = initial_resolution.1,
        "assembled background scene"
    );
    tracing::trace!(source = %wrapped, "wrapped fragment program");

    let material = Material {
        source: fragment_source.to_owned(),
        wrapped,
        bindings,
        uniforms: uniforms.clone(),
        fingerprint,
    };
    let scene = Scene {
        camera: Camera::fixed(),
        geometry: QuadGeometry::full_screen(),
        material,
    };
    Ok((scene, uniforms))
}

/// Assembles `fragment_source` for `surface` and compiles it on the surface's
/// backend before returning.
///
/// The uniform resolution starts at the surface's logical size. Front-end and
/// pipeline rejections both surface here as [`RenderError::ShaderCompile`].
pub fn assemble_on<B: SurfaceBackend>(
    surface: &mut Surface<B>,
    fragment_source: &str,
) -> Result<(Scene, UniformHandle), RenderError> {
    assemble_on_with(&NagaCompiler, surface, fragment_source)
}

/// Like [`assemble_on`] with an explicit front-end compiler.
pub fn assemble_on_with<C, B>(
    compiler: &C,
    surface: &mut Surface<B>,
    fragment_source: &str,
) -> Result<(Scene, UniformHandle), RenderError>
where
    C: ProgramCompiler + ?Sized,
    B: SurfaceBackend,
{
    let logical = surface.logical_size();
    let (scene, uniforms) =
        assemble_with(compiler, fragment_source, (logical.width, logical.height))?;
    surface.prepare(&scene)?;
    Ok((scene, uniforms))
}
