//! Animated values

/// A value an animation interpolates
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AnimationValue {
    /// Opacity, scale, rotation (radians), transition progress
    Scalar(f32),
    /// Position or size offsets
    Pair([f32; 2]),
}

impl AnimationValue {
    /// Linear interpolation. Mismatched shapes jump to `to` at `t >= 1`.
    pub fn lerp(&self, to: &AnimationValue, t: f32) -> AnimationValue {
        match (*self, *to) {
            (AnimationValue::Scalar(a), AnimationValue::Scalar(b)) => {
                AnimationValue::Scalar(a + (b - a) * t)
            }
            (AnimationValue::Pair(a), AnimationValue::Pair(b)) => AnimationValue::Pair([
                a[0] + (b[0] - a[0]) * t,
                a[1] + (b[1] - a[1]) * t,
            ]),
            _ => {
                if t >= 1.0 {
                    *to
                } else {
                    *self
                }
            }
        }
    }

    pub fn as_scalar(&self) -> Option<f32> {
        match self {
            AnimationValue::Scalar(v) => Some(*v),
            AnimationValue::Pair(_) => None,
        }
    }

    pub fn as_pair(&self) -> Option<[f32; 2]> {
        match self {
            AnimationValue::Pair(v) => Some(*v),
            AnimationValue::Scalar(_) => None,
        }
    }
}

impl From<f32> for AnimationValue {
    fn from(v: f32) -> Self {
        AnimationValue::Scalar(v)
    }
}

impl From<[f32; 2]> for AnimationValue {
    fn from(v: [f32; 2]) -> Self {
        AnimationValue::Pair(v)
    }
}

impl From<(f32, f32)> for AnimationValue {
    fn from((x, y): (f32, f32)) -> Self {
        AnimationValue::Pair([x, y])
    }
}
