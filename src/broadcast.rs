//! Normalisation of per-domain configuration values onto the selected domains.

use crate::{
    error::{Error, Result},
    value::Field,
};

/// Expands `value` into exactly `target` values for the domains in `selection`.
///
/// Rules, first match wins:
/// 1. a scalar is repeated `target` times
/// 2. an array of `full` values (when `full != target`) is sliced by each selected domain's
///    1-based index in the full tree
/// 3. an array of `target` values is passed through
/// 4. anything else is an arity mismatch
pub fn broadcast<T: Clone>(
    name: &str,
    value: &Field<T>,
    target: usize,
    selection: &[usize],
    full: usize,
) -> Result<Vec<T>> {
    match value {
        Field::Scalar(x) => Ok(vec![x.clone(); target]),
        Field::PerDomain(xs) if xs.len() == full && full != target => selection
            .iter()
            .map(|&d| {
                d.checked_sub(1)
                    .and_then(|i| xs.get(i))
                    .cloned()
                    .ok_or_else(|| Error::InvalidDomainSelection {
                        selection: selection.to_vec(),
                        reason: format!("domain {} is outside the {} configured domains", d, full),
                    })
            })
            .collect(),
        Field::PerDomain(xs) if xs.len() == target => Ok(xs.clone()),
        Field::PerDomain(xs) => Err(Error::ArityMismatch {
            field: name.to_owned(),
            actual: xs.len(),
            full,
            target,
        }),
    }
}

/// Ordered subset of domain indices (1-based, into the full domain tree) chosen for a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainSelection {
    domains: Vec<usize>,
    full: usize,
}

impl DomainSelection {
    /// Every domain of a tree with `full` domains, in order
    pub fn all(full: usize) -> Self {
        Self {
            domains: (1..=full).collect(),
            full,
        }
    }

    /// Selection of `domains` out of `full`, sorted ascending
    pub fn new(mut domains: Vec<usize>, full: usize) -> Result<Self> {
        domains.sort_unstable();
        domains.dedup();

        if domains.is_empty() {
            return Err(Error::InvalidDomainSelection {
                selection: domains,
                reason: "at least one domain must be selected".to_owned(),
            });
        }

        let outside = domains.iter().copied().find(|&d| d == 0 || d > full);
        if let Some(d) = outside {
            return Err(Error::InvalidDomainSelection {
                reason: format!("domain {} is outside the {} configured domains", d, full),
                selection: domains,
            });
        }

        Ok(Self { domains, full })
    }

    pub fn domains(&self) -> &[usize] {
        &self.domains
    }

    /// Number of selected domains (the run's `max_dom`)
    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    /// Number of domains in the full tree
    pub fn full(&self) -> usize {
        self.full
    }

    /// Domain that becomes domain 1 of the run
    pub fn top(&self) -> usize {
        self.domains[0]
    }

    /// Whether the run is rooted at an interior domain
    pub fn is_rerooted(&self) -> bool {
        self.top() != 1
    }

    /// Whether the selection is `1, 2, ..., n`
    pub fn is_leading_run(&self) -> bool {
        self.domains.iter().enumerate().all(|(i, &d)| d == i + 1)
    }

    /// Position (1-based) of the full-tree domain `domain` within the selection
    pub fn position(&self, domain: usize) -> Option<usize> {
        self.domains.iter().position(|&d| d == domain).map(|p| p + 1)
    }

    /// Broadcasts `value` to one entry per selected domain
    pub fn broadcast<T: Clone>(&self, name: &str, value: &Field<T>) -> Result<Vec<T>> {
        broadcast(name, value, self.len(), &self.domains, self.full)
    }

    /// Applies the override slicing rule: an array holding one value per configured domain is
    /// sliced onto the selection, anything else is kept verbatim.
    pub fn slice<T: Clone>(&self, value: &Field<T>) -> Field<T> {
        match value {
            Field::PerDomain(xs) if xs.len() == self.full && self.full != self.len() => {
                Field::PerDomain(self.domains.iter().map(|&d| xs[d - 1].clone()).collect())
            }
            other => other.clone(),
        }
    }
}
