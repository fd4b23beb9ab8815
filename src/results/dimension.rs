use super::step::DeviceDimension;
use std::fmt;

/// Canonical identity of a [`DeviceDimension`].
///
/// Pairs are sorted by key (then value) and deduplicated before they are
/// stored, so two dimensions holding the same set of pairs produce equal keys.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DimensionKey(Vec<(String, String)>);

impl DimensionKey {
    pub fn of(dimension: &DeviceDimension) -> Self {
        let mut pairs = dimension.entries().to_vec();
        pairs.sort();
        pairs.dedup();
        Self(pairs)
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.0
    }

    /// Steps without any dimension all share this key.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&DeviceDimension> for DimensionKey {
    fn from(dimension: &DeviceDimension) -> Self {
        Self::of(dimension)
    }
}

impl fmt::Display for DimensionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("<no dimension>");
        }
        for (i, (key, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}={}", key, value)?;
        }
        Ok(())
    }
}
