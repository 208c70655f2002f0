//! 地理围栏距离计算

/// 地球平均半径（米）
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// 大圆距离（haversine），单位米
///
/// 顾客上报的浏览器定位与餐厅注册坐标之间的距离，
/// 用于入座时的围栏校验。
pub fn haversine_distance_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_distance() {
        let d = haversine_distance_m(-23.5505, -46.6333, -23.5505, -46.6333);
        assert!(d < 0.001);
    }

    #[test]
    fn test_known_distance() {
        // 圣保罗大教堂 ↔ 保利斯塔大道，约 3.2 km
        let d = haversine_distance_m(-23.5505, -46.6333, -23.5614, -46.6559);
        assert!((2_000.0..4_500.0).contains(&d), "got {d}");
    }

    #[test]
    fn test_small_offset_within_radius() {
        // 约 100 米的经度偏移（赤道附近 0.0009°）
        let d = haversine_distance_m(0.0, 0.0, 0.0, 0.0009);
        assert!((80.0..120.0).contains(&d), "got {d}");
    }
}
