//! Lux - progressive CPU light transport.
//!
//! Scenes are built with [`SceneBuilder`], rendered one pass at a time by an
//! [`Integrator`] (path tracing, light tracing, bidirectional path tracing
//! or ambient occlusion) and resolved into an [`ImageBuffer`].

mod log_once;

mod bvh;
mod camera;
mod config;
mod distribution;
mod environment;
mod error;
mod film;
pub mod integrator;
mod light;
mod light_sampling;
mod material;
mod primitive;
mod quad;
mod sampler;
mod scene;
pub mod scenes;
mod spectrum;
mod sphere;
mod triangle;

pub use bvh::{Bvh, BvhNode};
pub use camera::{Camera, CameraIiSample};
pub use config::{
    EnvSelectStrategy, IntegratorKind, LightSelectStrategy, MisHeuristic, RenderConfig, TRACING_DEPTH_LIMIT,
};
pub use distribution::{Piecewise1D, PiecewiseIndependent2D};
pub use environment::{ConstantEnvironment, EnvLiSample, Environment, ImageEnvironment};
pub use error::{RenderError, RenderResult};
pub use film::{accumulate, color_to_rgba, linear_to_gamma, Film, ImageBuffer, SplatBuffer};
pub use integrator::{check_scene, create_integrator, Integrator, PixelIndependentIntegrator, PixelTracer};
pub use light::{AreaLight, LightLeSample, LightLiSample, PDF_EPSILON};
pub use light_sampling::{Emitter, LiSample};
pub use material::{BsdfFlags, BsdfSample, Dielectric, Lambertian, Material, Mirror, TransportMode};
pub use primitive::{Hittable, Primitive};
pub use quad::Quad;
pub use sampler::{hash_seed, IndependentSampler, Sampler};
pub use scene::{LightId, MaterialId, Object, ObjectId, ObjectKind, Scene, SceneBuilder, SurfaceHit};
pub use spectrum::{Spectrum, SpectrumExt};
pub use sphere::Sphere;
pub use triangle::Triangle;

/// Re-export the math types used throughout the API
pub use lux_math::{Aabb, Interval, Ray, Vec2, Vec3};
