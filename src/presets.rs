//! Built-in metric definitions.

use crate::config::MetricDefinition;

/// Preset names with a one-line description, in display order.
pub const PRESETS: &[(&str, &str)] = &[
    ("kerr", "Kerr black hole, Boyer-Lindquist coordinates (M, a)"),
    ("schwarzschild", "Schwarzschild vacuum solution (M)"),
    ("minkowski", "flat spacetime, Cartesian coordinates"),
    ("flrw", "spatially flat FLRW cosmology with scale factor a(t)"),
    ("tono", "rotating metric with angular velocity omega(r) (k)"),
    ("polar2d", "flat plane in polar coordinates"),
];

/// The preset loaded when nothing else is chosen.
pub const DEFAULT_PRESET: &str = "kerr";

pub fn names() -> impl Iterator<Item = &'static str> {
    PRESETS.iter().map(|(name, _)| *name)
}

/// Look up a preset by name.
pub fn preset(name: &str) -> Option<MetricDefinition> {
    let def = match name {
        "minkowski" => minkowski(),
        "schwarzschild" => schwarzschild(),
        "kerr" => kerr(),
        "flrw" => flrw(),
        "tono" => tono(),
        "polar2d" => polar2d(),
        _ => return None,
    };
    Some(def)
}

pub fn minkowski() -> MetricDefinition {
    MetricDefinition::new(&["t", "x", "y", "z"], &[], &[], "metric = diag(-1, 1, 1, 1)\n")
}

pub fn schwarzschild() -> MetricDefinition {
    MetricDefinition::new(
        &["t", "r", "theta", "phi"],
        &["M"],
        &[],
        "\
f = 1 - 2*M/r
metric = diag(-f, 1/f, r^2, r^2*sin(theta)^2)
",
    )
}

pub fn kerr() -> MetricDefinition {
    MetricDefinition::new(
        &["t", "r", "theta", "phi"],
        &["M", "a"],
        &[],
        "\
# Boyer-Lindquist coordinates
rho2 = r^2 + a^2*cos(theta)^2
Delta = r^2 - 2*M*r + a^2
gtp = -2*M*a*r*sin(theta)^2/rho2
metric = [
  [-(1 - 2*M*r/rho2), 0, 0, gtp],
  [0, rho2/Delta, 0, 0],
  [0, 0, rho2, 0],
  [gtp, 0, 0, ((r^2 + a^2)^2 - a^2*Delta*sin(theta)^2)*sin(theta)^2/rho2]
]
",
    )
}

pub fn flrw() -> MetricDefinition {
    MetricDefinition::new(
        &["t", "x", "y", "z"],
        &[],
        &["a"],
        "metric = diag(-1, a(t)^2, a(t)^2, a(t)^2)\n",
    )
}

pub fn tono() -> MetricDefinition {
    MetricDefinition::new(
        &["t", "r", "theta", "phi"],
        &["k"],
        &["omega"],
        "\
w = omega(r)
dw = diff(omega(r), r)
s2 = sin(theta)^2
A = r^2*exp(2*k/r)
metric = [
  [-exp(-2*k/r) + w^2*A*s2, dw*t*w*A*s2, 0, -w*A*s2],
  [dw*t*w*A*s2, -exp(2*k/r)*(1 + dw^2*t^2*r^2*s2), 0, -dw*t*A*s2],
  [0, 0, A, 0],
  [-w*A*s2, -dw*t*A*s2, 0, A*s2]
]
",
    )
}

pub fn polar2d() -> MetricDefinition {
    MetricDefinition::new(&["r", "phi"], &[], &[], "metric = diag(1, r^2)\n")
}
