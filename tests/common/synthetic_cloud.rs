use nalgebra::Vector3;

/// Hollow cylinder shell around a vertical axis at (cx, cy): `angles` points
/// per ring, rings every `z_step` from `z0` up to `z1`.
pub fn cylinder_shell(
    cx: f64,
    cy: f64,
    radius: f64,
    z0: f64,
    z1: f64,
    angles: usize,
    z_step: f64,
) -> Vec<Vector3<f64>> {
    partial_shell(cx, cy, radius, z0, z1, angles, z_step, 1.0)
}

/// Like `cylinder_shell` but covering only `arc_fraction` of the
/// circumference, starting at angle zero.
#[allow(clippy::too_many_arguments)]
pub fn partial_shell(
    cx: f64,
    cy: f64,
    radius: f64,
    z0: f64,
    z1: f64,
    angles: usize,
    z_step: f64,
    arc_fraction: f64,
) -> Vec<Vector3<f64>> {
    assert!(angles > 0 && z_step > 0.0, "degenerate shell");
    let mut pts = Vec::new();
    let mut z = z0;
    while z < z1 {
        for k in 0..angles {
            let a = k as f64 * std::f64::consts::TAU * arc_fraction / angles as f64;
            pts.push(Vector3::new(cx + radius * a.cos(), cy + radius * a.sin(), z));
        }
        z += z_step;
    }
    pts
}

/// Deterministic xorshift scatter inside a box of the given extent.
pub fn uniform_noise(n: usize, extent: f64, z_max: f64, seed: u64) -> Vec<Vector3<f64>> {
    let mut state = seed | 1;
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        (state >> 11) as f64 / (1u64 << 53) as f64
    };
    (0..n)
        .map(|_| Vector3::new(next() * extent, next() * extent, next() * z_max))
        .collect()
}
