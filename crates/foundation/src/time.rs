/// Time primitives
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd, Default)]
pub struct Time(pub f64); // seconds

impl Time {
    pub fn from_millis(ms: u64) -> Self {
        Time(ms as f64 / 1000.0)
    }

    pub fn plus_millis(self, ms: u64) -> Self {
        Time(self.0 + ms as f64 / 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::Time;

    #[test]
    fn millis_arithmetic() {
        let t = Time::from_millis(1500);
        assert_eq!(t, Time(1.5));
        assert_eq!(t.plus_millis(250), Time(1.75));
        assert!(t < t.plus_millis(1));
    }
}
