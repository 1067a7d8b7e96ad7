mod bvh;
mod core;
mod intersect;
mod polyline;

pub(crate) use bvh::Bvh;
pub use core::{
    BBox, Point3, Tolerance, Vec3, orient2d, push_unique_point, signed_area_xy, sort_points_xy,
};
pub use intersect::{Contact, intersect_segments, point_on_segment};
pub use polyline::{Arc, Polyline, Segment, Vertex, VertexInsertion};
