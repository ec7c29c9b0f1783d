//! Random numbers and sampling distributions.

mod distribution;
mod rng;

pub use distribution::{dir_to_equirect, equirect_to_dir, uv_pdf_to_solid_angle, Distribution2D};
pub use rng::{next, pcg_hash, Pcg, ONE_MINUS_EPSILON};
