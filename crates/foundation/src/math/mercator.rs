//! Spherical Web Mercator, in the pixel space used by slippy-map cameras.
//!
//! World pixel coordinates have their origin at the north-west corner
//! (lat ~85.05, lng -180) with `y` growing southwards. At zoom `z` the
//! world is `TILE_SIZE * 2^z` pixels wide.

use std::f64::consts::PI;

use crate::geo::{LatLng, LatLngBounds};

/// Pixel size of one zoom-0 tile.
pub const TILE_SIZE: f64 = 512.0;
/// Latitude where the Mercator square ends.
pub const MAX_MERCATOR_LAT: f64 = 85.051_128_779_806_59;

pub fn world_size(zoom: f64) -> f64 {
    TILE_SIZE * zoom.exp2()
}

/// Project a position to world pixels at `zoom`.
pub fn project(p: LatLng, zoom: f64) -> [f64; 2] {
    let ws = world_size(zoom);
    let lat = p.lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT);
    let x = (180.0 + p.lng) / 360.0;
    let y = (180.0 - (180.0 / PI) * (PI / 4.0 + lat.to_radians() / 2.0).tan().ln()) / 360.0;
    [x * ws, y * ws]
}

/// Inverse of [`project`].
pub fn unproject(px: [f64; 2], zoom: f64) -> LatLng {
    let ws = world_size(zoom);
    let lng = px[0] / ws * 360.0 - 180.0;
    let y2 = 180.0 - px[1] / ws * 360.0;
    let lat = 360.0 / PI * (y2 * PI / 180.0).exp().atan() - 90.0;
    LatLng::new(lat, lng)
}

/// Largest zoom (capped at `max_zoom`) at which `bounds` fits inside a
/// `width` x `height` viewport with `padding_px` on every side.
pub fn zoom_to_fit(
    bounds: &LatLngBounds,
    width: f64,
    height: f64,
    padding_px: f64,
    max_zoom: f64,
) -> f64 {
    let sw = project(bounds.south_west, 0.0);
    let ne = project(bounds.north_east, 0.0);
    let span_x = (ne[0] - sw[0]).abs();
    let span_y = (sw[1] - ne[1]).abs();

    let avail_x = (width - 2.0 * padding_px).max(1.0);
    let avail_y = (height - 2.0 * padding_px).max(1.0);

    let zx = if span_x > 0.0 { (avail_x / span_x).log2() } else { max_zoom };
    let zy = if span_y > 0.0 { (avail_y / span_y).log2() } else { max_zoom };
    zx.min(zy).min(max_zoom).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::{TILE_SIZE, project, unproject, world_size, zoom_to_fit};
    use crate::geo::{LatLng, LatLngBounds};

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    #[test]
    fn origin_projects_to_world_center() {
        let p = project(LatLng::new(0.0, 0.0), 3.0);
        assert_close(p[0], world_size(3.0) / 2.0, 1e-9);
        assert_close(p[1], world_size(3.0) / 2.0, 1e-9);
        assert_close(world_size(0.0), TILE_SIZE, 0.0);
    }

    #[test]
    fn unproject_inverts_project() {
        let ll = LatLng::new(40.1, -73.1);
        let back = unproject(project(ll, 12.5), 12.5);
        assert_close(back.lat, ll.lat, 1e-9);
        assert_close(back.lng, ll.lng, 1e-9);
    }

    #[test]
    fn north_is_up() {
        let a = project(LatLng::new(40.0, -73.0), 10.0);
        let b = project(LatLng::new(40.1, -73.1), 10.0);
        assert!(b[1] < a[1]);
        assert!(b[0] < a[0]);
    }

    #[test]
    fn fit_zoom_shrinks_for_wider_bounds() {
        let small = LatLngBounds::from_points([LatLng::new(40.0, -73.0), LatLng::new(40.1, -73.1)])
            .unwrap();
        let big = LatLngBounds::from_points([LatLng::new(30.0, -90.0), LatLng::new(45.0, -70.0)])
            .unwrap();
        let zs = zoom_to_fit(&small, 1024.0, 768.0, 40.0, 18.0);
        let zb = zoom_to_fit(&big, 1024.0, 768.0, 40.0, 18.0);
        assert!(zs > zb);
        assert!(zs <= 18.0);
    }

    #[test]
    fn single_point_fits_at_max_zoom() {
        let b = LatLngBounds::from_point(LatLng::new(40.0, -73.0));
        assert_close(zoom_to_fit(&b, 800.0, 600.0, 20.0, 15.0), 15.0, 0.0);
    }
}
