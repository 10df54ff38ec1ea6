//! Camera trajectories.

use serde::{Deserialize, Serialize};

use crate::transform::Transform;

/// One cumulative transform per frame, relative to frame 0.
///
/// Used for both the raw trajectory (composed motion estimates) and its
/// smoothed counterpart; the two always have the same length.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    transforms: Vec<Transform>,
}

impl Trajectory {
    pub fn new(transforms: Vec<Transform>) -> Self {
        Self { transforms }
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Transform> {
        self.transforms.get(index)
    }

    pub fn as_slice(&self) -> &[Transform] {
        &self.transforms
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Transform> {
        self.transforms.iter()
    }

    /// One scalar channel (`0 = dx, 1 = dy, 2 = angle, 3 = scale`) across all frames.
    pub fn channel(&self, component: usize) -> Vec<f64> {
        self.transforms
            .iter()
            .map(|t| t.to_components()[component])
            .collect()
    }
}

impl From<Vec<Transform>> for Trajectory {
    fn from(transforms: Vec<Transform>) -> Self {
        Self::new(transforms)
    }
}

impl<'a> IntoIterator for &'a Trajectory {
    type Item = &'a Transform;
    type IntoIter = std::slice::Iter<'a, Transform>;

    fn into_iter(self) -> Self::IntoIter {
        self.transforms.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_extraction() {
        let traj = Trajectory::new(vec![
            Transform::translation(1.0, 2.0),
            Transform::new(3.0, 4.0, 0.1, 1.5),
        ]);
        assert_eq!(traj.channel(0), vec![1.0, 3.0]);
        assert_eq!(traj.channel(3), vec![1.0, 1.5]);
    }

    #[test]
    fn test_serde_roundtrip_keeps_length() {
        let traj = Trajectory::new(vec![Transform::IDENTITY; 3]);
        let json = serde_json::to_string(&traj).unwrap();
        let back: Trajectory = serde_json::from_str(&json).unwrap();
        assert_eq!(back.len(), 3);
    }
}
