//! The qualifier value lattice
//!
//! A lattice is the finite, partially ordered set of qualifier values a slot
//! may take. It is immutable for the duration of an inference pass and is
//! consumed by constraint normalization and by the backend encoders.

use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{QualError, Result};

/// A handle to one qualifier value in a [`Lattice`]
///
/// Qualifiers are small copyable indices; they are only meaningful together
/// with the lattice that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Qualifier(u32);

impl Qualifier {
    /// Returns the index of this qualifier in its lattice
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Builder for a [`Lattice`]
///
/// Qualifiers are declared in a fixed order, which determines their indices.
/// The subtype relation is the reflexive-transitive closure of the declared
/// edges; the designated top must have nothing above it and the designated
/// bottom nothing below it.
#[derive(Debug, Default)]
pub struct LatticeBuilder {
    names: Vec<String>,
    edges: Vec<(String, String)>,
    top: Option<String>,
    bottom: Option<String>,
}

impl LatticeBuilder {
    /// Declares a qualifier with the given name
    pub fn qualifier(mut self, name: &str) -> Self {
        self.names.push(name.to_string());
        self
    }

    /// Declares a direct subtype edge `sub <: sup`
    pub fn edge(mut self, sub: &str, sup: &str) -> Self {
        self.edges.push((sub.to_string(), sup.to_string()));
        self
    }

    /// Designates the top qualifier
    pub fn top(mut self, name: &str) -> Self {
        self.top = Some(name.to_string());
        self
    }

    /// Designates the bottom qualifier
    pub fn bottom(mut self, name: &str) -> Self {
        self.bottom = Some(name.to_string());
        self
    }

    /// Builds the lattice, computing the reflexive-transitive closure of the
    /// declared edges and the derived incomparability relation
    ///
    /// # Errors
    /// Returns an error if no qualifiers were declared, a name is duplicated,
    /// an edge names an undeclared qualifier, top/bottom are unset, or a
    /// qualifier sits above the designated top or below the designated
    /// bottom.
    pub fn build(self) -> Result<Lattice> {
        if self.names.is_empty() {
            return Err(QualError::InvalidLattice(
                "lattice must contain at least one qualifier".to_string(),
            ));
        }

        let mut indices = FxHashMap::default();
        for (i, name) in self.names.iter().enumerate() {
            if indices.insert(name.clone(), i).is_some() {
                return Err(QualError::InvalidLattice(format!(
                    "{} is declared multiple times",
                    name
                )));
            }
        }

        let resolve = |name: &str| -> Result<usize> {
            indices.get(name).copied().ok_or_else(|| {
                QualError::InvalidLattice(format!("{} is not a declared qualifier", name))
            })
        };

        let top = resolve(self.top.as_deref().ok_or_else(|| {
            QualError::InvalidLattice("no top qualifier designated".to_string())
        })?)?;
        let bottom = resolve(self.bottom.as_deref().ok_or_else(|| {
            QualError::InvalidLattice("no bottom qualifier designated".to_string())
        })?)?;

        let n = self.names.len();
        let mut subtype = vec![vec![false; n]; n];

        for i in 0..n {
            subtype[i][i] = true;
        }
        for (sub, sup) in &self.edges {
            subtype[resolve(sub)?][resolve(sup)?] = true;
        }

        // transitive closure
        for k in 0..n {
            for i in 0..n {
                if subtype[i][k] {
                    for j in 0..n {
                        if subtype[k][j] {
                            subtype[i][j] = true;
                        }
                    }
                }
            }
        }

        for i in 0..n {
            if i != top && subtype[top][i] {
                return Err(QualError::InvalidLattice(format!(
                    "{} sits above the designated top {}",
                    self.names[i], self.names[top]
                )));
            }
            if i != bottom && subtype[i][bottom] {
                return Err(QualError::InvalidLattice(format!(
                    "{} sits below the designated bottom {}",
                    self.names[i], self.names[bottom]
                )));
            }
        }

        let mut subtypes_of = vec![Vec::new(); n];
        let mut supertypes_of = vec![Vec::new(); n];
        let mut incomparable = vec![Vec::new(); n];
        for i in 0..n {
            for j in 0..n {
                if subtype[j][i] {
                    subtypes_of[i].push(Qualifier(j as u32));
                }
                if subtype[i][j] {
                    supertypes_of[i].push(Qualifier(j as u32));
                }
                if !subtype[i][j] && !subtype[j][i] {
                    incomparable[i].push(Qualifier(j as u32));
                }
            }
        }

        // least upper bound table; falls back to top when no unique least
        // common supertype exists
        let mut lub = vec![vec![Qualifier(top as u32); n]; n];
        for a in 0..n {
            for b in 0..n {
                let common: Vec<usize> =
                    (0..n).filter(|&c| subtype[a][c] && subtype[b][c]).collect();
                let least = common
                    .iter()
                    .copied()
                    .find(|&c| common.iter().all(|&d| subtype[c][d]));
                if let Some(least) = least {
                    lub[a][b] = Qualifier(least as u32);
                }
            }
        }

        Ok(Lattice {
            inner: Arc::new(LatticeInner {
                names: self.names,
                indices,
                top: Qualifier(top as u32),
                bottom: Qualifier(bottom as u32),
                subtype,
                subtypes_of,
                supertypes_of,
                incomparable,
                lub,
            }),
        })
    }
}

/// The finite qualifier value lattice
///
/// Supplies the qualifier set, designated top and bottom, the subtype
/// predicate, and the derived incomparability relation. Cheap to clone.
#[derive(Clone)]
pub struct Lattice {
    inner: Arc<LatticeInner>,
}

struct LatticeInner {
    names: Vec<String>,
    indices: FxHashMap<String, usize>,
    top: Qualifier,
    bottom: Qualifier,
    subtype: Vec<Vec<bool>>,
    subtypes_of: Vec<Vec<Qualifier>>,
    supertypes_of: Vec<Vec<Qualifier>>,
    incomparable: Vec<Vec<Qualifier>>,
    lub: Vec<Vec<Qualifier>>,
}

impl Lattice {
    /// Returns a new lattice builder
    pub fn builder() -> LatticeBuilder {
        LatticeBuilder::default()
    }

    /// Returns the number of qualifiers
    pub fn size(&self) -> usize {
        self.inner.names.len()
    }

    /// Returns the qualifiers in declaration order
    pub fn qualifiers(&self) -> impl Iterator<Item = Qualifier> + '_ {
        (0..self.size() as u32).map(Qualifier)
    }

    /// Returns the designated top qualifier
    pub fn top(&self) -> Qualifier {
        self.inner.top
    }

    /// Returns the designated bottom qualifier
    pub fn bottom(&self) -> Qualifier {
        self.inner.bottom
    }

    /// Returns the name of the given qualifier
    pub fn name(&self, q: Qualifier) -> &str {
        &self.inner.names[q.index()]
    }

    /// Returns the qualifier with the given name, if declared
    pub fn qualifier(&self, name: &str) -> Option<Qualifier> {
        self.inner.indices.get(name).map(|&i| Qualifier(i as u32))
    }

    /// Returns the qualifier at the given index
    ///
    /// # Errors
    /// Returns an error if the index is out of range.
    pub fn qualifier_at(&self, index: usize) -> Result<Qualifier> {
        if index < self.size() {
            Ok(Qualifier(index as u32))
        } else {
            Err(QualError::InvalidArgument(format!(
                "qualifier index {} out of range for lattice of size {}",
                index,
                self.size()
            )))
        }
    }

    /// Returns true if `sub` is a subtype of `sup`
    pub fn is_subtype(&self, sub: Qualifier, sup: Qualifier) -> bool {
        self.inner.subtype[sub.index()][sup.index()]
    }

    /// Returns true if the two qualifiers are related in either direction
    pub fn are_comparable(&self, a: Qualifier, b: Qualifier) -> bool {
        self.is_subtype(a, b) || self.is_subtype(b, a)
    }

    /// Returns the qualifiers incomparable with `q`, in declaration order
    pub fn incomparable_with(&self, q: Qualifier) -> &[Qualifier] {
        &self.inner.incomparable[q.index()]
    }

    /// Returns all subtypes of `q`, including `q` itself
    pub fn subtypes_of(&self, q: Qualifier) -> &[Qualifier] {
        &self.inner.subtypes_of[q.index()]
    }

    /// Returns all supertypes of `q`, including `q` itself
    pub fn supertypes_of(&self, q: Qualifier) -> &[Qualifier] {
        &self.inner.supertypes_of[q.index()]
    }

    /// Returns the least upper bound of the two qualifiers
    ///
    /// Falls back to top when the pair has no unique least common supertype.
    pub fn lub(&self, a: Qualifier, b: Qualifier) -> Qualifier {
        self.inner.lub[a.index()][b.index()]
    }
}

impl fmt::Debug for Lattice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lattice")
            .field("qualifiers", &self.inner.names)
            .field("top", &self.name(self.top()))
            .field("bottom", &self.name(self.bottom()))
            .finish()
    }
}
