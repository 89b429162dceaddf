/// The capability surface the bridge depends on.
///
/// An `Engine` owns one quantum-chemistry session: a molecule, an assigned
/// basis set, and whatever derived state (integrals, SCF results) it decides
/// to cache. The bridge never looks inside; it only calls this contract and
/// converts the results for the host.
///
/// Index convention: everything on this surface is 0-based. The bridge's
/// convention adapter is the single place where the host's 1-based indices
/// are shifted.
///
/// Failure convention: inspection getters cannot fail once an instance
/// exists. Anything that computes — integral evaluation, SCF — returns
/// `Result<_, EngineError>` so a failed computation crosses the dispatcher
/// boundary as a reported error instead of unwinding through the host.
pub mod model;

use std::fmt;

use crate::core::Matrix;

pub use model::ModelEngine;

// ── Error type ────────────────────────────────────────────────────────────

/// A failure inside the delegated computation (malformed molecule spec,
/// unknown basis set, numerical non-convergence, state accessed before it
/// was produced).
#[derive(Debug, Clone)]
pub struct EngineError {
    pub msg: String,
}

impl EngineError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "engine failure: {}", self.msg)
    }
}

impl std::error::Error for EngineError {}

pub type EngineResult<T> = Result<T, EngineError>;

// ── Capability surface ────────────────────────────────────────────────────

pub trait Engine {
    /// Duplicate the full internal state into an independent instance.
    /// Backs the copy-construction command.
    fn box_clone(&self) -> Box<dyn Engine>;

    // ── Molecule properties ────────────────────────────────────────────
    fn natom(&self) -> usize;
    fn nelec(&self) -> usize;
    /// Nuclear repulsion energy.
    fn enuc(&self) -> f64;
    /// Geometry as a natom×3 matrix (row per atom).
    fn coord(&self) -> Matrix;
    /// Nuclear charge per atom.
    fn zlist(&self) -> Vec<f64>;
    /// Print a human-readable description of the molecule. Diagnostic only.
    fn testmol(&self);

    // ── Basis set properties ───────────────────────────────────────────
    fn nbasis(&self) -> usize;
    /// Owning atom per basis function (0-based).
    fn func2center(&self) -> Vec<usize>;
    /// Angular momentum per basis function.
    fn func2am(&self) -> Vec<usize>;

    // ── One-electron integrals ─────────────────────────────────────────
    fn overlap(&self) -> EngineResult<Matrix>;
    fn kinetic(&self) -> EngineResult<Matrix>;
    fn potential(&self) -> EngineResult<Matrix>;
    /// Nuclear attraction split per atom; slices sum to `potential()`.
    fn potential_sep(&self) -> EngineResult<Vec<Matrix>>;
    /// Attraction to a single external point charge (charge, x, y, z).
    fn potential_point_charge(&self, charge: f64, x: f64, y: f64, z: f64) -> EngineResult<Matrix>;
    /// Attraction to a list of point charges, one {charge,x,y,z} row each.
    fn potential_point_charges(&self, charges: &Matrix) -> EngineResult<Matrix>;
    /// Dipole integrals, one symmetric matrix per Cartesian axis.
    fn dipole(&self) -> EngineResult<[Matrix; 3]>;

    // ── Two-electron integrals ─────────────────────────────────────────
    /// Single integral (ij|kl), all indices 0-based.
    fn tei(&self, i: usize, j: usize, k: usize, l: usize) -> EngineResult<f64>;
    /// Number of symmetry-unique two-electron integrals.
    fn tei_uniq_count(&self) -> usize;
    /// Fill `out` (length `tei_uniq_count()`) with the unique integrals in
    /// canonical order: i ≥ j, k ≥ l, composite ij ≥ kl.
    fn tei_alluniq(&self, out: &mut [f64]) -> EngineResult<()>;
    /// Fill `out` (length nbasis⁴) with the full four-index tensor; index
    /// (i,j,k,l) lives at ((i*n + j)*n + k)*n + l.
    fn tei_allfull(&self, out: &mut [f64]) -> EngineResult<()>;
    /// Coulomb-ordered (ij|kl) and exchange-ordered (ik|jl) values per
    /// unique quadruple, in the same canonical order as `tei_alluniq`.
    fn tei_alluniq_jk(&self, out_j: &mut [f64], out_k: &mut [f64]) -> EngineResult<()>;

    // ── Density contractions ───────────────────────────────────────────
    /// Coulomb matrix from an nbasis×noccupied occupied-orbital block.
    fn occ_mo_to_j(&self, occ_mo: &Matrix) -> EngineResult<Matrix>;
    /// Exchange matrix from the same input.
    fn occ_mo_to_k(&self, occ_mo: &Matrix) -> EngineResult<Matrix>;
    /// Two-electron part of the Fock matrix: G = 2J − K.
    fn occ_mo_to_g(&self, occ_mo: &Matrix) -> EngineResult<Matrix>;

    // ── SCF ────────────────────────────────────────────────────────────
    /// Run the restricted Hartree-Fock procedure to convergence and return
    /// the total energy. Results are cached for the accessors below.
    fn rhf(&mut self) -> EngineResult<f64>;
    /// Commit converged results and release SCF scratch state.
    fn rhf_finalize(&mut self);
    fn rhf_energy(&self) -> EngineResult<f64>;
    /// Molecular-orbital coefficients, nbasis×nbasis, one orbital per column.
    fn rhf_coefficients(&self) -> EngineResult<Matrix>;
    /// Orbital energies, ascending.
    fn rhf_orbital_energies(&self) -> EngineResult<Vec<f64>>;
    fn rhf_density(&self) -> EngineResult<Matrix>;
    fn rhf_core_hamiltonian(&self) -> EngineResult<Matrix>;
    fn rhf_coulomb(&self) -> EngineResult<Matrix>;
    fn rhf_exchange(&self) -> EngineResult<Matrix>;
    fn rhf_fock(&self) -> EngineResult<Matrix>;
}
