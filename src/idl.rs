use crate::error::GammetError;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// List of configuration indices at which a replica was measured.
///
/// Indices are positive and strictly increasing. A contiguous run is stored
/// compactly as an inclusive range; irregular measurements keep the explicit
/// list. `from_indices` canonicalizes, so two lists describing the same
/// configurations always compare equal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IndexList {
    Range { first: usize, last: usize },
    Explicit(Vec<usize>),
}

impl IndexList {
    /// Contiguous index list `first..=last`.
    pub fn range(first: usize, last: usize) -> Result<Self, GammetError> {
        if first == 0 {
            return Err(GammetError::InvalidIndexList(
                "Configuration indices have to be positive".into(),
            ));
        }
        if last < first {
            return Err(GammetError::InvalidIndexList(format!(
                "Empty range: {}..={}",
                first, last
            )));
        }
        Ok(IndexList::Range { first, last })
    }

    /// Build an index list from explicit indices, validating monotonicity and
    /// collapsing contiguous runs to the compact form.
    pub fn from_indices(indices: Vec<usize>) -> Result<Self, GammetError> {
        if indices.is_empty() {
            return Err(GammetError::InvalidIndexList(
                "Index list must not be empty".into(),
            ));
        }
        if indices[0] == 0 {
            return Err(GammetError::InvalidIndexList(
                "Configuration indices have to be positive".into(),
            ));
        }
        for w in indices.windows(2) {
            if w[1] <= w[0] {
                return Err(GammetError::InvalidIndexList(format!(
                    "Indices have to be strictly increasing: {} followed by {}",
                    w[0], w[1]
                )));
            }
        }
        Ok(Self::canonical(indices))
    }

    fn canonical(indices: Vec<usize>) -> Self {
        let first = indices[0];
        let last = *indices.last().unwrap();
        if last - first + 1 == indices.len() {
            IndexList::Range { first, last }
        } else {
            IndexList::Explicit(indices)
        }
    }

    pub fn len(&self) -> usize {
        match self {
            IndexList::Range { first, last } => last - first + 1,
            IndexList::Explicit(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn first(&self) -> usize {
        match self {
            IndexList::Range { first, .. } => *first,
            IndexList::Explicit(v) => v[0],
        }
    }

    pub fn last(&self) -> usize {
        match self {
            IndexList::Range { last, .. } => *last,
            IndexList::Explicit(v) => *v.last().unwrap(),
        }
    }

    /// Number of configurations spanned, holes included.
    pub fn span(&self) -> usize {
        self.last() - self.first() + 1
    }

    pub fn is_contiguous(&self) -> bool {
        matches!(self, IndexList::Range { .. })
    }

    pub fn contains(&self, idx: usize) -> bool {
        match self {
            IndexList::Range { first, last } => idx >= *first && idx <= *last,
            IndexList::Explicit(v) => v.binary_search(&idx).is_ok(),
        }
    }

    /// Position of a configuration index within the list, if measured.
    pub fn index_of(&self, idx: usize) -> Option<usize> {
        match self {
            IndexList::Range { first, last } => {
                if idx >= *first && idx <= *last {
                    Some(idx - first)
                } else {
                    None
                }
            }
            IndexList::Explicit(v) => v.binary_search(&idx).ok(),
        }
    }

    pub fn iter(&self) -> IndexIter<'_> {
        match self {
            IndexList::Range { first, last } => IndexIter::Range(*first..=*last),
            IndexList::Explicit(v) => IndexIter::Explicit(v.iter()),
        }
    }

    /// True when every index of `self` is also measured in `other`.
    pub fn is_subset_of(&self, other: &IndexList) -> bool {
        self.iter().all(|i| other.contains(i))
    }

    /// Sorted union of two index lists.
    pub fn union(&self, other: &IndexList) -> IndexList {
        if let (IndexList::Range { first: a0, last: a1 }, IndexList::Range { first: b0, last: b1 }) =
            (self, other)
        {
            // Overlapping or adjacent ranges stay a range.
            if *a0 <= b1 + 1 && *b0 <= a1 + 1 {
                return IndexList::Range {
                    first: (*a0).min(*b0),
                    last: (*a1).max(*b1),
                };
            }
        }
        let mut merged = Vec::with_capacity(self.len() + other.len());
        let mut ia = self.iter().peekable();
        let mut ib = other.iter().peekable();
        loop {
            match (ia.peek(), ib.peek()) {
                (Some(&a), Some(&b)) => {
                    if a < b {
                        merged.push(a);
                        ia.next();
                    } else if b < a {
                        merged.push(b);
                        ib.next();
                    } else {
                        merged.push(a);
                        ia.next();
                        ib.next();
                    }
                }
                (Some(&a), None) => {
                    merged.push(a);
                    ia.next();
                }
                (None, Some(&b)) => {
                    merged.push(b);
                    ib.next();
                }
                (None, None) => break,
            }
        }
        Self::canonical(merged)
    }

    /// Sorted intersection of two index lists. May be empty
    /// (`Explicit(vec![])`), in which case the replicas share no
    /// configurations.
    pub fn intersection(&self, other: &IndexList) -> IndexList {
        if let (IndexList::Range { first: a0, last: a1 }, IndexList::Range { first: b0, last: b1 }) =
            (self, other)
        {
            let first = (*a0).max(*b0);
            let last = (*a1).min(*b1);
            if first <= last {
                return IndexList::Range { first, last };
            }
            return IndexList::Explicit(Vec::new());
        }
        let mut common = Vec::new();
        let mut ia = self.iter().peekable();
        let mut ib = other.iter().peekable();
        while let (Some(&a), Some(&b)) = (ia.peek(), ib.peek()) {
            if a < b {
                ia.next();
            } else if b < a {
                ib.next();
            } else {
                common.push(a);
                ia.next();
                ib.next();
            }
        }
        if common.is_empty() {
            IndexList::Explicit(common)
        } else {
            Self::canonical(common)
        }
    }
}

impl PartialEq for IndexList {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().zip(other.iter()).all(|(a, b)| a == b)
    }
}

impl Eq for IndexList {}

pub enum IndexIter<'a> {
    Range(std::ops::RangeInclusive<usize>),
    Explicit(std::slice::Iter<'a, usize>),
}

impl Iterator for IndexIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        match self {
            IndexIter::Range(r) => r.next(),
            IndexIter::Explicit(it) => it.next().copied(),
        }
    }
}

/// Expand mean-zero deltas to a dense series over `[first, last]` with zeros
/// at unmeasured configurations. Holes contribute nothing to autocorrelation
/// sums because the deltas are centered.
pub fn expand_deltas(deltas: &Array1<f64>, idl: &IndexList) -> Array1<f64> {
    match idl {
        IndexList::Range { .. } => deltas.clone(),
        IndexList::Explicit(v) => {
            let first = v[0];
            let mut dense = Array1::<f64>::zeros(idl.span());
            for (d, &i) in deltas.iter().zip(v.iter()) {
                dense[i - first] = *d;
            }
            dense
        }
    }
}

/// Re-index deltas defined on `idl` onto the superset `target`, zeros at
/// configurations not measured in `idl`.
///
/// The entries are rescaled by `target.len() / idl.len()` so that an
/// estimator normalizing by the output measurement count reproduces the
/// input's variance contribution.
pub fn expand_deltas_to(
    deltas: &Array1<f64>,
    idl: &IndexList,
    target: &IndexList,
) -> Array1<f64> {
    if idl == target {
        return deltas.clone();
    }
    let scale = target.len() as f64 / idl.len() as f64;
    let mut out = Array1::<f64>::zeros(target.len());
    let mut src = idl.iter().zip(deltas.iter()).peekable();
    for (j, t) in target.iter().enumerate() {
        while let Some(&(i, _)) = src.peek() {
            if i < t {
                src.next();
            } else {
                break;
            }
        }
        if let Some(&(i, d)) = src.peek() {
            if i == t {
                out[j] = d * scale;
                src.next();
            }
        }
    }
    out
}

/// Restrict deltas defined on `idl` to the sub-list `target`. No rescaling:
/// the caller reconstructs raw samples and recenters.
pub fn reduce_deltas(
    deltas: &Array1<f64>,
    idl: &IndexList,
    target: &IndexList,
) -> Result<Array1<f64>, GammetError> {
    let mut out = Array1::<f64>::zeros(target.len());
    for (j, t) in target.iter().enumerate() {
        match idl.index_of(t) {
            Some(pos) => out[j] = deltas[pos],
            None => {
                return Err(GammetError::ShapeMismatch(format!(
                    "Configuration {} is not contained in the source index list",
                    t
                )))
            }
        }
    }
    Ok(out)
}
