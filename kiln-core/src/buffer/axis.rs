//! Per-dimension access and packing modes.

use std::fmt;

use crate::error::BufferError;

/// The six named axis modes exposed through the `view` namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AxisMode {
    /// Elements are reached through the stride alone.
    Direct,
    /// Elements are reached through a pointer hop that is always present.
    Ptr,
    /// Elements may or may not be reached through a pointer hop.
    Full,
    /// The axis has unit stride (one item).
    Contig,
    /// The axis has an arbitrary stride.
    Strided,
    /// The axis is packed to follow its contiguous neighbour.
    Follow,
}

impl AxisMode {
    pub const ALL: [AxisMode; 6] = [
        AxisMode::Direct,
        AxisMode::Ptr,
        AxisMode::Full,
        AxisMode::Contig,
        AxisMode::Strided,
        AxisMode::Follow,
    ];

    /// Name of the constant in the `view` namespace.
    pub const fn name(self) -> &'static str {
        match self {
            AxisMode::Direct => "direct",
            AxisMode::Ptr => "ptr",
            AxisMode::Full => "full",
            AxisMode::Contig => "contig",
            AxisMode::Strided => "strided",
            AxisMode::Follow => "follow",
        }
    }

    pub fn from_name(name: &str) -> Option<AxisMode> {
        AxisMode::ALL.into_iter().find(|mode| mode.name() == name)
    }

    pub const fn is_access(self) -> bool {
        matches!(self, AxisMode::Direct | AxisMode::Ptr | AxisMode::Full)
    }

    pub const fn is_packing(self) -> bool {
        !self.is_access()
    }

    pub const fn as_spec(self) -> AxisSpec {
        match self {
            AxisMode::Direct => AxisSpec::DIRECT,
            AxisMode::Ptr => AxisSpec::PTR,
            AxisMode::Full => AxisSpec::FULL,
            AxisMode::Contig => AxisSpec::CONTIG,
            AxisMode::Strided => AxisSpec::STRIDED,
            AxisMode::Follow => AxisSpec::FOLLOW,
        }
    }
}

impl fmt::Display for AxisMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_access() { "access" } else { "packing" };
        write!(f, "<{} axis {} mode>", self.name(), kind)
    }
}

bitflags::bitflags! {
    /// Access and packing flags of one dimension.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AxisSpec: u8 {
        const DIRECT = 1 << 0;
        const PTR = 1 << 1;
        const FULL = 1 << 2;
        const CONTIG = 1 << 3;
        const STRIDED = 1 << 4;
        const FOLLOW = 1 << 5;

        const ACCESS = Self::DIRECT.bits() | Self::PTR.bits() | Self::FULL.bits();
        const PACKING = Self::CONTIG.bits() | Self::STRIDED.bits() | Self::FOLLOW.bits();
    }
}

impl AxisSpec {
    /// Combine one access mode with one packing mode.
    pub fn new(access: AxisMode, packing: AxisMode) -> Result<Self, BufferError> {
        AxisSpec::from_modes(0, &[access, packing])
    }

    /// Build the spec of dimension `dim` from its mode annotation.
    ///
    /// A lone packing mode implies direct access.
    pub fn from_modes(dim: usize, modes: &[AxisMode]) -> Result<Self, BufferError> {
        let mut spec = AxisSpec::empty();
        for mode in modes {
            let flag = mode.as_spec();
            if spec.contains(flag) {
                return Err(BufferError::InvalidAxisSpec {
                    dim,
                    reason: "mode given twice",
                });
            }
            spec |= flag;
        }
        if (spec & AxisSpec::ACCESS).is_empty() {
            spec |= AxisSpec::DIRECT;
        }
        spec.validate(dim)?;
        Ok(spec)
    }

    /// Check that exactly one access flag and exactly one packing flag are set.
    pub fn validate(self, dim: usize) -> Result<(), BufferError> {
        if (self & AxisSpec::ACCESS).bits().count_ones() != 1 {
            return Err(BufferError::InvalidAxisSpec {
                dim,
                reason: "exactly one of direct, ptr, full is required",
            });
        }
        if (self & AxisSpec::PACKING).bits().count_ones() != 1 {
            return Err(BufferError::InvalidAxisSpec {
                dim,
                reason: "exactly one of contig, strided, follow is required",
            });
        }
        Ok(())
    }

    pub const fn direct_contig() -> Self {
        AxisSpec::DIRECT.union(AxisSpec::CONTIG)
    }

    pub const fn direct_follow() -> Self {
        AxisSpec::DIRECT.union(AxisSpec::FOLLOW)
    }

    pub const fn direct_strided() -> Self {
        AxisSpec::DIRECT.union(AxisSpec::STRIDED)
    }
}

/// The declared element type and per-axis layout of a memory view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewSpec {
    axes: Vec<AxisSpec>,
    format: String,
    itemsize: isize,
}

impl ViewSpec {
    pub fn new(
        axes: Vec<AxisSpec>,
        format: impl Into<String>,
        itemsize: isize,
    ) -> Result<Self, BufferError> {
        for (dim, axis) in axes.iter().enumerate() {
            axis.validate(dim)?;
        }
        if itemsize <= 0 {
            return Err(BufferError::InvalidItemSize(itemsize));
        }
        Ok(ViewSpec {
            axes,
            format: format.into(),
            itemsize,
        })
    }

    pub fn axes(&self) -> &[AxisSpec] {
        &self.axes
    }

    pub fn ndim(&self) -> usize {
        self.axes.len()
    }

    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn itemsize(&self) -> isize {
        self.itemsize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_follow_mode_kind() {
        assert_eq!(AxisMode::Strided.to_string(), "<strided axis packing mode>");
        assert_eq!(AxisMode::Ptr.to_string(), "<ptr axis access mode>");
        assert_eq!(AxisMode::from_name("follow"), Some(AxisMode::Follow));
        assert_eq!(AxisMode::from_name("diagonal"), None);
    }

    #[test]
    fn lone_packing_mode_implies_direct() {
        let spec = AxisSpec::from_modes(0, &[AxisMode::Contig]).unwrap();
        assert_eq!(spec, AxisSpec::direct_contig());
    }

    #[test]
    fn rejects_two_packing_modes() {
        let err = AxisSpec::from_modes(2, &[AxisMode::Contig, AxisMode::Follow]).unwrap_err();
        assert!(matches!(err, BufferError::InvalidAxisSpec { dim: 2, .. }));
    }

    #[test]
    fn rejects_missing_packing_mode() {
        let err = AxisSpec::new(AxisMode::Ptr, AxisMode::Full).unwrap_err();
        assert!(matches!(err, BufferError::InvalidAxisSpec { .. }));
        assert!(AxisSpec::DIRECT.validate(0).is_err());
    }

    #[test]
    fn view_spec_validates_every_axis() {
        let err = ViewSpec::new(vec![AxisSpec::direct_follow(), AxisSpec::CONTIG], "i", 4)
            .unwrap_err();
        assert!(matches!(err, BufferError::InvalidAxisSpec { dim: 1, .. }));
    }
}
