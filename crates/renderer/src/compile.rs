use std::borrow::Cow;

use wgpu::naga::front::glsl::{Frontend, Options};
use wgpu::naga::valid::{Capabilities, ValidationFlags, Validator};
use wgpu::naga::ShaderStage;

use crate::error::RenderError;
use crate::scene::{UniformBinding, UniformSlot};

/// Front-end check run before any GPU resource is created.
///
/// Assembly refuses to produce a scene when this fails, so a broken program
/// never reaches the swapchain.
pub trait ProgramCompiler {
    fn check(&self, wrapped_source: &str, stage: ShaderStage) -> Result<(), RenderError>;
}

/// Parses and validates GLSL with naga, the same frontend wgpu uses.
#[derive(Debug, Default, Clone, Copy)]
pub struct NagaCompiler;

impl ProgramCompiler for NagaCompiler {
    fn check(&self, wrapped_source: &str, stage: ShaderStage) -> Result<(), RenderError> {
        let mut frontend = Frontend::default();
        let module = frontend
            .parse(&Options::from(stage), wrapped_source)
            .map_err(|err| RenderError::ShaderCompile(err.to_string()))?;
        Validator::new(ValidationFlags::all(), Capabilities::all())
            .validate(&module)
            .map_err(|err| RenderError::ShaderCompile(err.as_inner().to_string()))?;
        Ok(())
    }
}

/// Compiles the quad vertex shader.
pub(crate) fn compile_vertex_shader(device: &wgpu::Device) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("backdrop quad vertex"),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Borrowed(VERTEX_SHADER_GLSL),
            stage: ShaderStage::Vertex,
            defines: &[],
        },
    })
}

/// Compiles an already wrapped fragment program.
pub(crate) fn compile_fragment_shader(device: &wgpu::Device, wrapped: &str) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("backdrop fragment"),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Owned(wrapped.to_owned()),
            stage: ShaderStage::Fragment,
            defines: &[],
        },
    })
}

/// Turns a WebGL-style fragment program into Vulkan GLSL.
///
/// Steps performed:
///
/// 1. Strip comments, `#version`, `precision` statements and the declarations
///    of the bound uniforms so the prologue can provide them. Line breaks are
///    kept so compiler diagnostics still point at the original lines.
/// 2. Prepend [`HEADER`] (uniform block, macros for each binding,
///    `gl_FragColor`/`gl_FragCoord` stand-ins) and rename the program's `main`.
/// 3. Append [`FOOTER`] which flips `gl_FragCoord` to a bottom-left origin,
///    runs the program and writes the output attachment.
pub fn wrap_fragment(source: &str, bindings: &[UniformBinding]) -> String {
    let bound: Vec<&str> = bindings.iter().map(|binding| binding.name.as_str()).collect();
    let mut sanitized = String::new();
    for line in strip_comments(source).lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("#version") {
            sanitized.push('\n');
            continue;
        }
        if trimmed.starts_with("precision ") || trimmed.starts_with("uniform ") {
            sanitized.push_str(&strip_declarations(line, &bound));
        } else {
            sanitized.push_str(line);
        }
        sanitized.push('\n');
    }

    let mut macros = String::new();
    for binding in bindings {
        let field = match binding.slot {
            UniformSlot::Time => "_time",
            UniformSlot::Resolution => "_resolution",
        };
        macros.push_str(&format!("#define {} frame.{field}\n", binding.name));
    }

    format!("{HEADER}{macros}{PROGRAM_PREAMBLE}#line 1\n{sanitized}{FOOTER}")
}

/// Replaces `//` and `/* */` comments with whitespace, keeping newlines.
fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    while let Some(c) = chars.next() {
        match (c, chars.peek().copied()) {
            ('/', Some('/')) => {
                while chars.peek().is_some_and(|next| *next != '\n') {
                    chars.next();
                }
            }
            ('/', Some('*')) => {
                chars.next();
                out.push(' ');
                let mut previous = '\0';
                for inner in chars.by_ref() {
                    if inner == '\n' {
                        out.push('\n');
                    }
                    if previous == '*' && inner == '/' {
                        break;
                    }
                    previous = inner;
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// Rewrites the statements on a `precision`/`uniform` line: precision
/// statements go, and bound names are removed from uniform declarations
/// (dropping the declaration once no names remain).
fn strip_declarations(line: &str, bound: &[&str]) -> String {
    let mut statements: Vec<&str> = line.split(';').collect();
    // Text after the last `;` is not a complete statement.
    let remainder = statements.pop().unwrap_or_default();

    let mut kept = String::new();
    for statement in statements {
        let trimmed = statement.trim();
        if trimmed.starts_with("precision ") {
            continue;
        }
        if trimmed.starts_with("uniform ") {
            if let Some(rewritten) = without_bound_names(trimmed, bound) {
                kept.push_str(&rewritten);
                kept.push(';');
            }
            continue;
        }
        kept.push_str(statement);
        kept.push(';');
    }
    kept.push_str(remainder);
    kept
}

/// `uniform <type> a, b` minus the bound names; `None` when nothing is left.
fn without_bound_names(declaration: &str, bound: &[&str]) -> Option<String> {
    let mut parts = declaration.split(',');
    let first = parts.next()?.trim();
    let (prefix, first_name) = first.rsplit_once(char::is_whitespace)?;
    let names: Vec<&str> = std::iter::once(first_name)
        .chain(parts.map(str::trim))
        .filter(|name| !bound.contains(&declared_name(name)))
        .collect();
    if names.is_empty() {
        None
    } else {
        Some(format!("{} {}", prefix.trim_end(), names.join(", ")))
    }
}

/// Name without an array suffix (`u_values[4]` -> `u_values`).
fn declared_name(name: &str) -> &str {
    name.split('[').next().unwrap_or(name).trim()
}

/// Uniform block shared by both stages. Must match [`crate::uniforms::FrameUniforms`].
macro_rules! frame_block {
    () => {
        r"layout(std140, set = 0, binding = 0) uniform BackdropFrame {
    mat4 _view_projection;
    vec2 _resolution;
    float _time;
    float _physical_height;
} frame;
"
    };
}

const HEADER: &str = concat!(
    "#version 450\n",
    "layout(location = 0) out vec4 backdrop_out_color;\n\n",
    frame_block!(),
    "\n"
);

const PROGRAM_PREAMBLE: &str = r"
vec4 backdrop_frag_color;
vec4 backdrop_frag_coord;
#define gl_FragColor backdrop_frag_color
#define gl_FragCoord backdrop_frag_coord
#define main backdrop_program_main
";

const FOOTER: &str = r"
#undef main
void main() {
    // Read the hardware builtin, then remap to the bottom-left origin WebGL programs expect.
    #undef gl_FragCoord
    vec4 builtin_coord = gl_FragCoord;
    #define gl_FragCoord backdrop_frag_coord

    backdrop_frag_coord = vec4(
        builtin_coord.x,
        frame._physical_height - builtin_coord.y,
        builtin_coord.z,
        builtin_coord.w
    );
    backdrop_frag_color = vec4(0.0, 0.0, 0.0, 1.0);
    backdrop_program_main();
    backdrop_out_color = backdrop_frag_color;
}
";

/// Quad vertex shader; positions arrive in clip space and pass through the fixed camera.
const VERTEX_SHADER_GLSL: &str = concat!(
    "#version 450\n",
    "layout(location = 0) in vec2 position;\n\n",
    frame_block!(),
    r"
void main() {
    gl_Position = frame._view_projection * vec4(position, 0.0, 1.0);
}
"
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::{FragmentProgram, ProgramPreset};
    use crate::scene::default_bindings;

    #[test]
    fn wrap_strips_bound_uniforms_and_precision() {
        let source = r#"
            #version 100
            precision highp float;
            uniform float u_time;
            uniform vec2 u_resolution;
            uniform float u_other;
            void main() {
                gl_FragColor = vec4(u_time, 0.0, 0.0, 1.0);
            }
        "#;

        let wrapped = wrap_fragment(source, &default_bindings());
        assert!(!wrapped.contains("uniform float u_time;"));
        assert!(!wrapped.contains("uniform vec2 u_resolution;"));
        assert!(!wrapped.contains("precision highp"));
        assert!(!wrapped.contains("#version 100"));
        assert!(wrapped.contains("uniform float u_other;"));
        assert!(wrapped.contains("#define u_time frame._time"));
        assert!(wrapped.contains("#define u_resolution frame._resolution"));
        assert!(wrapped.contains("backdrop_program_main();"));
    }

    #[test]
    fn wrap_handles_commented_and_grouped_declarations() {
        let source = "uniform vec2 u_resolution; // viewport size\n\
            uniform float u_time; uniform float u_speed;\n\
            uniform float u_gain, u_time, u_bias;\n\
            /* uniform float u_time;\n\
               still a comment */ void main() {\n\
                gl_FragColor = vec4(u_resolution, u_time * u_speed, 1.0);\n\
            }\n";

        let wrapped = wrap_fragment(source, &default_bindings());
        let program = &wrapped[wrapped.find("#line 1\n").unwrap()..];
        assert!(!program.contains("uniform vec2 u_resolution"));
        assert!(!program.contains("viewport size"));
        assert!(!program.contains("uniform float u_time"));
        assert!(program.contains("uniform float u_speed;"));
        assert!(program.contains("uniform float u_gain, u_bias;"));
        assert!(!program.contains("still a comment"));
        // Original line structure survives for diagnostics.
        assert_eq!(
            program.lines().position(|line| line.contains("void main()")),
            Some(5)
        );
    }

    #[test]
    fn commented_uniform_programs_validate() {
        let source = "precision highp float;\n\
            uniform float u_time;\n\
            uniform vec2 u_resolution; // viewport size\n\
            void main() {\n\
                vec2 uv = gl_FragCoord.xy / u_resolution.xy;\n\
                gl_FragColor = vec4(uv, sin(u_time), 1.0);\n\
            }\n";
        let wrapped = wrap_fragment(source, &default_bindings());
        NagaCompiler
            .check(&wrapped, ShaderStage::Fragment)
            .expect("commented declarations should validate");
    }

    #[test]
    fn vertex_shader_validates() {
        NagaCompiler
            .check(VERTEX_SHADER_GLSL, ShaderStage::Vertex)
            .expect("vertex shader should validate");
    }

    #[test]
    fn preset_programs_validate() {
        for preset in ProgramPreset::ALL {
            let wrapped = wrap_fragment(&FragmentProgram::preset(preset).glsl(), &default_bindings());
            NagaCompiler
                .check(&wrapped, ShaderStage::Fragment)
                .unwrap_or_else(|err| panic!("{} failed: {err}", preset.name()));
        }
    }

    #[test]
    fn syntax_errors_become_compile_errors() {
        let wrapped = wrap_fragment(
            "void main() { gl_FragColor = vec4(1.0) }",
            &default_bindings(),
        );
        let err = NagaCompiler
            .check(&wrapped, ShaderStage::Fragment)
            .unwrap_err();
        assert!(matches!(err, RenderError::ShaderCompile(_)));
    }
}
