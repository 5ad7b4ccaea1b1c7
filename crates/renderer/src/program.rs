//! Procedural background colour program.
//!
//! The same tuning drives two renditions: [`FragmentProgram::color`] evaluates
//! a pixel on the CPU (still export, tests) and [`FragmentProgram::glsl`] emits
//! the fragment source the GPU pipeline compiles. Only the constants in
//! [`ProgramTuning`] vary between presets; the shape of the algorithm is fixed:
//!
//! ```text
//!   uv = pixel / resolution
//!   gradient = clamp(uv.y + wave_x + wave_y + wave_diagonal)   ─▶ mix(color_a, color_b)
//!   shapes   = clamp(Σ blob(uv, center, size))                 ─▶ mix(base, fog, shapes * opacity)
//!   grain    = hash(uv * resolution * scale + time * speed)    ─▶ + grain * amplitude
//! ```

use std::fmt::Write as _;

/// One sinusoidal term of the gradient: `f(axis * frequency + t * speed) * amplitude`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaveTerm {
    pub frequency: f32,
    pub speed: f32,
    pub amplitude: f32,
}

impl WaveTerm {
    pub const fn new(frequency: f32, speed: f32, amplitude: f32) -> Self {
        Self {
            frequency,
            speed,
            amplitude,
        }
    }
}

/// Soft circular mask drifting around `center`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Blob {
    pub center: [f32; 2],
    pub size: f32,
    /// Width of the smoothstep falloff inside `size`.
    pub edge: f32,
    /// Amplitude of the sinusoidal drift applied to the sample position.
    pub wobble: f32,
    pub speed: f32,
    /// Added to the elapsed time so blobs do not move in lockstep.
    pub time_offset: f32,
}

/// Per-pixel grain added on top of the blended colour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grain {
    pub scale: f32,
    pub speed: f32,
    pub amplitude: f32,
}

/// Every constant the program reads.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramTuning {
    /// Multiplier turning elapsed seconds into gradient phase.
    pub time_rate: f32,
    /// Terms over `uv.x` (sin), `uv.y` (cos) and `uv.x + uv.y` (sin).
    pub waves: [WaveTerm; 3],
    pub color_a: [f32; 3],
    pub color_b: [f32; 3],
    pub fog_color: [f32; 3],
    pub fog_opacity: f32,
    pub blobs: Vec<Blob>,
    pub grain: Grain,
}

/// Named tunings bundled with the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramPreset {
    /// Bright pastel gradient with three drifting blobs.
    Landing,
    /// Slower dusk palette with two blobs and lighter grain.
    Ambient,
}

impl ProgramPreset {
    pub const ALL: [ProgramPreset; 2] = [ProgramPreset::Landing, ProgramPreset::Ambient];

    pub fn name(self) -> &'static str {
        match self {
            ProgramPreset::Landing => "landing",
            ProgramPreset::Ambient => "ambient",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let normalized = name.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|preset| preset.name() == normalized)
    }

    pub fn tuning(self) -> ProgramTuning {
        match self {
            ProgramPreset::Landing => ProgramTuning {
                time_rate: 0.3,
                waves: [
                    WaveTerm::new(6.0, 1.2, 0.4),
                    WaveTerm::new(8.0, -1.5, 0.3),
                    WaveTerm::new(4.0, 0.8, 0.2),
                ],
                color_a: [0.95, 0.7, 0.95],
                color_b: [1.0, 0.95, 0.75],
                fog_color: [0.85, 0.75, 0.95],
                fog_opacity: 0.45,
                blobs: vec![
                    blob([0.3, 0.4], 0.5, 0.25, 0.0),
                    blob([0.7, 0.6], 0.4, 0.2, 0.0),
                    blob([0.5, 0.5], 0.6, 0.15, 100.0),
                ],
                grain: Grain {
                    scale: 0.1,
                    speed: 5.0,
                    amplitude: 0.12,
                },
            },
            ProgramPreset::Ambient => ProgramTuning {
                time_rate: 0.15,
                waves: [
                    WaveTerm::new(3.0, 0.6, 0.3),
                    WaveTerm::new(5.0, -0.9, 0.2),
                    WaveTerm::new(2.0, 0.4, 0.0),
                ],
                color_a: [0.55, 0.6, 0.85],
                color_b: [0.95, 0.78, 0.7],
                fog_color: [0.7, 0.72, 0.9],
                fog_opacity: 0.35,
                blobs: vec![
                    blob([0.25, 0.7], 0.45, 0.12, 0.0),
                    blob([0.75, 0.3], 0.5, 0.1, 42.0),
                ],
                grain: Grain {
                    scale: 0.1,
                    speed: 3.0,
                    amplitude: 0.06,
                },
            },
        }
    }
}

impl Default for ProgramPreset {
    fn default() -> Self {
        ProgramPreset::Landing
    }
}

fn blob(center: [f32; 2], size: f32, speed: f32, time_offset: f32) -> Blob {
    Blob {
        center,
        size,
        edge: 0.1,
        wobble: 0.05,
        speed,
        time_offset,
    }
}

impl Default for ProgramTuning {
    fn default() -> Self {
        ProgramPreset::default().tuning()
    }
}

/// The animated background colour function.
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentProgram {
    tuning: ProgramTuning,
}

impl FragmentProgram {
    pub fn new(tuning: ProgramTuning) -> Self {
        Self { tuning }
    }

    pub fn preset(preset: ProgramPreset) -> Self {
        Self::new(preset.tuning())
    }

    pub fn tuning(&self) -> &ProgramTuning {
        &self.tuning
    }

    /// Evaluates the program for one pixel.
    ///
    /// `pixel` uses the GL convention (origin bottom-left, pixel centres at
    /// `.5`). The result is not clamped; the GPU clamps on write.
    pub fn color(&self, pixel: [f32; 2], resolution: [f32; 2], time: f32) -> [f32; 4] {
        let tuning = &self.tuning;
        let uv = [pixel[0] / resolution[0], pixel[1] / resolution[1]];
        let t = time * tuning.time_rate;

        let [wave_x, wave_y, wave_diagonal] = tuning.waves;
        let gradient_mix = (uv[1]
            + (uv[0] * wave_x.frequency + t * wave_x.speed).sin() * wave_x.amplitude
            + (uv[1] * wave_y.frequency + t * wave_y.speed).cos() * wave_y.amplitude
            + ((uv[0] + uv[1]) * wave_diagonal.frequency + t * wave_diagonal.speed).sin()
                * wave_diagonal.amplitude)
            .clamp(0.0, 1.0);
        let base = mix3(tuning.color_a, tuning.color_b, gradient_mix);

        let shape_mask = tuning
            .blobs
            .iter()
            .map(|blob| blob_mask(uv, blob, time))
            .sum::<f32>()
            .clamp(0.0, 1.0);
        let shaped = mix3(base, tuning.fog_color, shape_mask * tuning.fog_opacity);

        let seed = [
            uv[0] * resolution[0] * tuning.grain.scale + time * tuning.grain.speed,
            uv[1] * resolution[1] * tuning.grain.scale + time * tuning.grain.speed,
        ];
        let noise = hash(seed) * tuning.grain.amplitude;

        [shaped[0] + noise, shaped[1] + noise, shaped[2] + noise, 1.0]
    }

    /// Emits the program as a GLSL fragment shader reading `u_time` and
    /// `u_resolution` and writing `gl_FragColor`.
    pub fn glsl(&self) -> String {
        let tuning = &self.tuning;
        let mut out = String::new();
        out.push_str(GLSL_PRELUDE);

        let [wave_x, wave_y, wave_diagonal] = tuning.waves;
        let _ = writeln!(out, "void main() {{");
        let _ = writeln!(out, "    vec2 uv = gl_FragCoord.xy / u_resolution.xy;");
        let _ = writeln!(out, "    float t = u_time * {};", lit(tuning.time_rate));
        let _ = writeln!(
            out,
            "    float wave1 = sin(uv.x * {} + t * {}) * {};",
            lit(wave_x.frequency),
            lit(wave_x.speed),
            lit(wave_x.amplitude)
        );
        let _ = writeln!(
            out,
            "    float wave2 = cos(uv.y * {} + t * {}) * {};",
            lit(wave_y.frequency),
            lit(wave_y.speed),
            lit(wave_y.amplitude)
        );
        let _ = writeln!(
            out,
            "    float wave3 = sin((uv.x + uv.y) * {} + t * {}) * {};",
            lit(wave_diagonal.frequency),
            lit(wave_diagonal.speed),
            lit(wave_diagonal.amplitude)
        );
        let _ = writeln!(
            out,
            "    float gradientMix = clamp(uv.y + wave1 + wave2 + wave3, 0.0, 1.0);"
        );
        let _ = writeln!(
            out,
            "    vec3 base = mix({}, {}, gradientMix);",
            vec3_lit(tuning.color_a),
            vec3_lit(tuning.color_b)
        );

        let _ = writeln!(out, "    float shapeMask = 0.0;");
        for blob in &tuning.blobs {
            let _ = writeln!(
                out,
                "    shapeMask += blob(uv, vec2({}, {}), {}, {}, {}, {}, u_time + {});",
                lit(blob.center[0]),
                lit(blob.center[1]),
                lit(blob.size),
                lit(blob.edge),
                lit(blob.wobble),
                lit(blob.speed),
                lit(blob.time_offset)
            );
        }
        let _ = writeln!(out, "    shapeMask = clamp(shapeMask, 0.0, 1.0);");
        let _ = writeln!(
            out,
            "    vec3 withShapes = mix(base, {}, shapeMask * {});",
            vec3_lit(tuning.fog_color),
            lit(tuning.fog_opacity)
        );
        let _ = writeln!(
            out,
            "    float noise = rand(uv * u_resolution.xy * {} + vec2(u_time * {})) * {};",
            lit(tuning.grain.scale),
            lit(tuning.grain.speed),
            lit(tuning.grain.amplitude)
        );
        let _ = writeln!(out, "    gl_FragColor = vec4(withShapes + vec3(noise), 1.0);");
        out.push_str("}\n");
        out
    }
}

impl Default for FragmentProgram {
    fn default() -> Self {
        Self::new(ProgramTuning::default())
    }
}

const GLSL_PRELUDE: &str = r"precision highp float;

uniform float u_time;
uniform vec2 u_resolution;

float rand(vec2 co) {
    return fract(sin(dot(co, vec2(12.9898, 78.233))) * 43758.5453);
}

float blob(vec2 uv, vec2 center, float size, float edge, float wobble, float speed, float t) {
    float d = length(uv - center + vec2(wobble * sin(t * speed)));
    return smoothstep(size, size - edge, d);
}

";

fn blob_mask(uv: [f32; 2], blob: &Blob, time: f32) -> f32 {
    let drift = blob.wobble * ((time + blob.time_offset) * blob.speed).sin();
    let dx = uv[0] - blob.center[0] + drift;
    let dy = uv[1] - blob.center[1] + drift;
    let distance = (dx * dx + dy * dy).sqrt();
    smoothstep(blob.size, blob.size - blob.edge, distance)
}

/// GLSL `smoothstep`, including the reversed-edge form the blobs rely on.
fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

fn hash(co: [f32; 2]) -> f32 {
    let dot = co[0] * 12.9898 + co[1] * 78.233;
    fract(dot.sin() * 43758.5453)
}

fn fract(value: f32) -> f32 {
    value - value.floor()
}

fn mix3(a: [f32; 3], b: [f32; 3], amount: f32) -> [f32; 3] {
    [
        a[0] + (b[0] - a[0]) * amount,
        a[1] + (b[1] - a[1]) * amount,
        a[2] + (b[2] - a[2]) * amount,
    ]
}

/// Formats a float as a GLSL literal (`1.0`, `(-1.5)`).
fn lit(value: f32) -> String {
    if value < 0.0 {
        format!("({value:?})")
    } else {
        format!("{value:?}")
    }
}

fn vec3_lit(value: [f32; 3]) -> String {
    format!("vec3({}, {}, {})", lit(value[0]), lit(value[1]), lit(value[2]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_is_bit_for_bit_reproducible() {
        let program = FragmentProgram::preset(ProgramPreset::Landing);
        let first = program.color([123.5, 456.5], [1920.0, 1080.0], 12.345);
        let second = program.color([123.5, 456.5], [1920.0, 1080.0], 12.345);
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
        let clone = program.clone();
        let third = clone.color([123.5, 456.5], [1920.0, 1080.0], 12.345);
        assert_eq!(first, third);
    }

    #[test]
    fn output_is_opaque_and_in_expected_range() {
        for preset in ProgramPreset::ALL {
            let program = FragmentProgram::preset(preset);
            for &(x, y) in &[(0.5, 0.5), (400.5, 300.5), (799.5, 599.5)] {
                let color = program.color([x, y], [800.0, 600.0], 3.0);
                assert_eq!(color[3], 1.0);
                let grain = program.tuning().grain.amplitude;
                for channel in &color[..3] {
                    assert!(*channel >= 0.0 && *channel <= 1.0 + grain, "{channel}");
                }
            }
        }
    }

    #[test]
    fn colour_changes_over_time() {
        let program = FragmentProgram::default();
        let early = program.color([200.5, 200.5], [800.0, 600.0], 0.0);
        let later = program.color([200.5, 200.5], [800.0, 600.0], 7.5);
        assert_ne!(early, later);
    }

    #[test]
    fn reversed_smoothstep_is_one_inside_the_blob() {
        assert_eq!(smoothstep(0.5, 0.4, 0.0), 1.0);
        assert_eq!(smoothstep(0.5, 0.4, 0.6), 0.0);
        let mid = smoothstep(0.5, 0.4, 0.45);
        assert!((mid - 0.5).abs() < 1e-5);
    }

    #[test]
    fn hash_stays_in_unit_interval() {
        for i in 0..64 {
            let value = hash([i as f32 * 3.7, i as f32 * 1.3]);
            assert!((0.0..1.0).contains(&value));
        }
    }

    #[test]
    fn glsl_mentions_every_blob_and_uniform() {
        let program = FragmentProgram::preset(ProgramPreset::Landing);
        let source = program.glsl();
        assert!(source.contains("uniform float u_time;"));
        assert!(source.contains("uniform vec2 u_resolution;"));
        assert_eq!(source.matches("shapeMask += blob(").count(), 3);
        assert!(source.contains("t * (-1.5)"));

        let ambient = FragmentProgram::preset(ProgramPreset::Ambient).glsl();
        assert_eq!(ambient.matches("shapeMask += blob(").count(), 2);
    }

    #[test]
    fn presets_resolve_by_name() {
        assert_eq!(ProgramPreset::from_name("Landing"), Some(ProgramPreset::Landing));
        assert_eq!(ProgramPreset::from_name(" ambient "), Some(ProgramPreset::Ambient));
        assert_eq!(ProgramPreset::from_name("unknown"), None);
    }
}
