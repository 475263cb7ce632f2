//! Built-in scenes, used by the CLI and as regression fixtures.

use crate::camera::Camera;
use crate::config::RenderConfig;
use crate::environment::ConstantEnvironment;
use crate::material::{Dielectric, Lambertian, Mirror};
use crate::quad::Quad;
use crate::scene::{Scene, SceneBuilder};
use crate::spectrum::Spectrum;
use crate::sphere::Sphere;
use crate::triangle::Triangle;
use crate::{RenderError, RenderResult};
use lux_math::Vec3;

/// Emitted radiance of the light in [`lit_quad`].
pub const LIT_QUAD_RADIANCE: Spectrum = Spectrum::new(6.0, 6.0, 6.0);

/// Names accepted by [`by_name`].
pub const SCENE_NAMES: [&str; 4] = ["cornell", "lit_quad", "glass", "mirror_sky"];

/// Build a built-in scene by name.
pub fn by_name(name: &str, config: &RenderConfig) -> RenderResult<Scene> {
    match name {
        "cornell" => cornell_box(config),
        "lit_quad" => lit_quad(config),
        "glass" => glass_sphere(config),
        "mirror_sky" => mirror_sky(config),
        _ => Err(RenderError::InvalidScene(format!(
            "unknown scene '{name}', expected one of {}",
            SCENE_NAMES.join(", ")
        ))),
    }
}

/// Closed-back box spanning [-1, 1]³, open towards +z, with a square
/// light under the ceiling and two diffuse blocks of spheres.
pub fn cornell_box(config: &RenderConfig) -> RenderResult<Scene> {
    let camera = Camera::new()
        .with_position(Vec3::new(0.0, 0.0, 3.4), Vec3::ZERO, Vec3::Y)
        .with_lens(40.0, 0.0, 3.4);
    let mut scene = SceneBuilder::new(camera);

    let white = scene.add_material(Lambertian::new(Spectrum::new(0.73, 0.73, 0.73)));
    let red = scene.add_material(Lambertian::new(Spectrum::new(0.65, 0.05, 0.05)));
    let green = scene.add_material(Lambertian::new(Spectrum::new(0.12, 0.45, 0.15)));

    // Floor, ceiling, back
    scene.add_object(Quad::new(Vec3::new(-1.0, -1.0, -1.0), 2.0 * Vec3::X, 2.0 * Vec3::Z), white);
    scene.add_object(Quad::new(Vec3::new(-1.0, 1.0, -1.0), 2.0 * Vec3::Z, 2.0 * Vec3::X), white);
    scene.add_object(Quad::new(Vec3::new(-1.0, -1.0, -1.0), 2.0 * Vec3::Y, 2.0 * Vec3::X), white);
    // Left and right walls
    scene.add_object(Quad::new(Vec3::new(-1.0, -1.0, -1.0), 2.0 * Vec3::Z, 2.0 * Vec3::Y), red);
    scene.add_object(Quad::new(Vec3::new(1.0, -1.0, -1.0), 2.0 * Vec3::Y, 2.0 * Vec3::Z), green);

    scene.add_object(Sphere::new(Vec3::new(-0.4, -0.6, -0.3), 0.4), white);
    scene.add_object(Sphere::new(Vec3::new(0.45, -0.7, 0.3), 0.3), white);

    // Facing down (u × v = -y)
    scene.add_area_light(
        Quad::new(Vec3::new(-0.4, 0.99, -0.4), 0.8 * Vec3::X, 0.8 * Vec3::Z),
        Spectrum::new(12.0, 11.0, 9.0),
        false,
    );

    scene.build(config)
}

/// A single one-sided emitter directly above a diffuse quad, camera
/// looking at both.
pub fn lit_quad(config: &RenderConfig) -> RenderResult<Scene> {
    let camera = Camera::new()
        .with_position(Vec3::new(0.0, 1.0, 4.0), Vec3::new(0.0, 1.2, 0.0), Vec3::Y)
        .with_lens(60.0, 0.0, 4.0);
    let mut scene = SceneBuilder::new(camera);

    let grey = scene.add_material(Lambertian::new(Spectrum::splat(0.5)));
    scene.add_object(Quad::new(Vec3::new(-2.0, 0.0, -2.0), 4.0 * Vec3::Z, 4.0 * Vec3::X), grey);
    scene.add_area_light(
        Quad::new(Vec3::new(-0.5, 2.0, -0.5), Vec3::X, Vec3::Z),
        LIT_QUAD_RADIANCE,
        false,
    );

    scene.build(config)
}

/// Glass ball and a mirror tetrahedron face on a ground plane under an
/// overcast sky with a two-sided panel light.
pub fn glass_sphere(config: &RenderConfig) -> RenderResult<Scene> {
    let camera = Camera::new()
        .with_position(Vec3::new(0.0, 1.5, 5.0), Vec3::new(0.0, 0.6, 0.0), Vec3::Y)
        .with_lens(45.0, 0.02, 5.0);
    let mut scene = SceneBuilder::new(camera);

    let ground = scene.add_material(Lambertian::new(Spectrum::new(0.6, 0.55, 0.5)));
    let glass = scene.add_material(Dielectric::new(1.5));
    let mirror = scene.add_material(Mirror::new(Spectrum::splat(0.9)));

    scene.add_object(Quad::new(Vec3::new(-6.0, 0.0, -6.0), 12.0 * Vec3::Z, 12.0 * Vec3::X), ground);
    scene.add_object(Sphere::new(Vec3::new(0.0, 0.8, 0.0), 0.8), glass);
    scene.add_object(
        Triangle::with_normal(
            Vec3::new(-2.5, 0.0, -1.5),
            Vec3::new(-1.0, 0.0, -2.0),
            Vec3::new(-1.8, 1.6, -1.8),
            Vec3::new(0.5, 0.2, 1.0).normalize(),
        ),
        mirror,
    );
    scene.add_area_light(
        Quad::new(Vec3::new(1.5, 2.5, -1.0), Vec3::Z, Vec3::new(0.7, -0.7, 0.0)),
        Spectrum::splat(8.0),
        true,
    );
    scene.set_environment(ConstantEnvironment::new(Spectrum::new(0.3, 0.35, 0.45)));

    scene.build(config)
}

/// Mirror and diffuse spheres lit only by the sky.
pub fn mirror_sky(config: &RenderConfig) -> RenderResult<Scene> {
    let camera = Camera::new()
        .with_position(Vec3::new(0.0, 1.0, 4.0), Vec3::new(0.0, 0.5, 0.0), Vec3::Y)
        .with_lens(50.0, 0.0, 4.0);
    let mut scene = SceneBuilder::new(camera);

    let ground = scene.add_material(Lambertian::new(Spectrum::splat(0.5)));
    let mirror = scene.add_material(Mirror::new(Spectrum::new(0.95, 0.9, 0.8)));
    let blue = scene.add_material(Lambertian::new(Spectrum::new(0.1, 0.2, 0.6)));

    scene.add_object(Quad::new(Vec3::new(-5.0, 0.0, -5.0), 10.0 * Vec3::Z, 10.0 * Vec3::X), ground);
    scene.add_object(Sphere::new(Vec3::new(-0.6, 0.5, 0.0), 0.5), mirror);
    scene.add_object(Sphere::new(Vec3::new(0.6, 0.5, 0.0), 0.5), blue);
    scene.set_environment(ConstantEnvironment::new(Spectrum::splat(1.0)));

    scene.build(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::ObjectKind;
    use crate::spectrum::SpectrumExt;
    use lux_math::Ray;

    #[test]
    fn test_builtin_scenes_build() {
        let config = RenderConfig::default().with_resolution(16, 9);
        for name in SCENE_NAMES {
            let scene = by_name(name, &config).unwrap();
            assert_eq!(scene.camera().image_width, 16);
            assert_eq!(scene.camera().image_height, 9);
        }
        assert!(matches!(by_name("teapot", &config), Err(RenderError::InvalidScene(_))));
    }

    #[test]
    fn test_cornell_light_faces_down() {
        let config = RenderConfig::default();
        let scene = cornell_box(&config).unwrap();
        let hit = scene.intersect(&Ray::new(Vec3::ZERO, Vec3::Y)).unwrap();
        let ObjectKind::Light { light } = hit.kind else {
            panic!("expected the light, got {:?}", hit.kind);
        };
        assert!(!scene.light(light).le(hit.ng, -Vec3::Y).is_black());
        assert!(hit.ng.y < 0.0);
    }

    #[test]
    fn test_cornell_box_is_closed_behind() {
        let config = RenderConfig::default();
        let scene = cornell_box(&config).unwrap();
        for dir in [-Vec3::Z, Vec3::X, -Vec3::X, -Vec3::Y] {
            assert!(scene.intersect(&Ray::new(Vec3::new(0.0, 0.5, 0.0), dir)).is_some(), "{dir}");
        }
        // Open front
        assert!(scene.intersect(&Ray::new(Vec3::new(0.0, 0.5, 0.0), Vec3::Z)).is_none());
    }
}
