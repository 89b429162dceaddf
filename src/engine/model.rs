/// Deterministic model chemistry behind the `Engine` trait.
///
/// This is not a real integrals package. It exists so the bridge has a
/// complete, well-behaved engine to drive: every matrix it produces has the
/// exact shapes and symmetries the real capability surface promises, all
/// values are smooth deterministic functions of the geometry, and the SCF
/// procedure is a genuine self-consistent fixed point over the model
/// integrals (Jacobi eigensolver, symmetric orthogonalization, damped
/// Fock updates).
///
/// Molecule specification: one atom per non-blank line, `Symbol x y z`
/// (coordinates in bohr). Elements H through Ar are accepted.
/// Basis sets: `sto-3g` and `6-31g`, with synthetic per-function exponents.
use std::fmt;

use super::{Engine, EngineError, EngineResult};
use crate::core::Matrix;

// ── Element data ──────────────────────────────────────────────────────────

const ELEMENTS: [&str; 18] = [
    "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne", "Na", "Mg", "Al", "Si", "P", "S",
    "Cl", "Ar",
];

fn element_number(symbol: &str) -> Option<usize> {
    ELEMENTS
        .iter()
        .position(|s| s.eq_ignore_ascii_case(symbol))
        .map(|i| i + 1)
}

// ── Internal structures ───────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Atom {
    z: usize,
    pos: [f64; 3],
}

#[derive(Debug, Clone)]
struct BasisFunction {
    /// Owning atom index (0-based).
    atom: usize,
    /// Angular momentum (0 = s, 1 = p).
    am: usize,
    /// Synthetic Gaussian exponent.
    alpha: f64,
}

/// Converged SCF results, cached on the instance.
#[derive(Debug, Clone)]
struct ScfResults {
    energy: f64,
    c: Matrix,
    emo: Vec<f64>,
    d: Matrix,
    h: Matrix,
    j: Matrix,
    k: Matrix,
    f: Matrix,
}

// ── ModelEngine ───────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct ModelEngine {
    atoms: Vec<Atom>,
    basis_name: String,
    funcs: Vec<BasisFunction>,
    scf: Option<ScfResults>,
    /// S^(-1/2) kept between SCF runs; released by `rhf_finalize`.
    scf_scratch: Option<Matrix>,
}

impl ModelEngine {
    /// Construct a session from a molecule string and basis-set name.
    pub fn new(mol_spec: &str, basis_name: &str) -> EngineResult<Self> {
        let atoms = parse_molecule(mol_spec)?;
        let funcs = assign_basis(&atoms, basis_name)?;
        Ok(Self {
            atoms,
            basis_name: basis_name.to_ascii_lowercase(),
            funcs,
            scf: None,
            scf_scratch: None,
        })
    }

    // ── Pair kernels ───────────────────────────────────────────────────

    fn center(&self, f: usize) -> [f64; 3] {
        self.atoms[self.funcs[f].atom].pos
    }

    /// Model overlap between functions f and g. Unit diagonal, symmetric,
    /// decays with center separation and exponent mismatch.
    fn pair_overlap(&self, f: usize, g: usize) -> f64 {
        let (bf, bg) = (&self.funcs[f], &self.funcs[g]);
        let (a, b) = (bf.alpha, bg.alpha);
        let p = a + b;
        let mu = a * b / p;
        let d2 = dist2(self.center(f), self.center(g));
        let angular = if bf.am == bg.am { 1.0 } else { 0.6 };
        angular * (2.0 * (a * b).sqrt() / p).powf(0.75) * (-mu * d2).exp()
    }

    /// Exponent-weighted midpoint of the two function centers.
    fn pair_center(&self, f: usize, g: usize) -> [f64; 3] {
        let (a, b) = (self.funcs[f].alpha, self.funcs[g].alpha);
        let p = a + b;
        let (rf, rg) = (self.center(f), self.center(g));
        [
            (a * rf[0] + b * rg[0]) / p,
            (a * rf[1] + b * rg[1]) / p,
            (a * rf[2] + b * rg[2]) / p,
        ]
    }

    fn pair_kinetic(&self, f: usize, g: usize) -> f64 {
        let (a, b) = (self.funcs[f].alpha, self.funcs[g].alpha);
        let p = a + b;
        let mu = a * b / p;
        let d2 = dist2(self.center(f), self.center(g));
        mu * (3.0 - 2.0 * mu * d2) * self.pair_overlap(f, g)
    }

    /// Attraction of pair (f, g) to a point charge q at r.
    fn pair_attraction(&self, f: usize, g: usize, q: f64, r: [f64; 3]) -> f64 {
        let pc = self.pair_center(f, g);
        -q * self.pair_overlap(f, g) / (1.0 + dist2(pc, r).sqrt())
    }

    /// Model two-electron integral (fg|hl); carries the full 8-fold
    /// permutational symmetry because both factors and the pair centers are
    /// symmetric in their own index pair.
    fn tei_value(&self, i: usize, j: usize, k: usize, l: usize) -> f64 {
        let qij = self.pair_overlap(i, j);
        let qkl = self.pair_overlap(k, l);
        let d = dist2(self.pair_center(i, j), self.pair_center(k, l)).sqrt();
        qij * qkl / (1.0 + d)
    }

    fn symmetric(&self, f: impl Fn(usize, usize) -> f64) -> Matrix {
        let n = self.nbasis();
        let mut m = Matrix::zeros(n, n);
        for i in 0..n {
            for j in 0..=i {
                let v = f(i, j);
                m.set(i, j, v);
                m.set(j, i, v);
            }
        }
        m
    }

    fn check_index(&self, idx: usize, what: &str) -> EngineResult<()> {
        if idx >= self.nbasis() {
            return Err(EngineError::new(format!(
                "{what} index {idx} out of range for {} basis functions",
                self.nbasis()
            )));
        }
        Ok(())
    }

    // ── Density contraction ────────────────────────────────────────────

    fn check_occ_block(&self, occ_mo: &Matrix) -> EngineResult<()> {
        if occ_mo.rows() != self.nbasis() {
            return Err(EngineError::new(format!(
                "occupied MO block has {} rows, expected nbasis = {}",
                occ_mo.rows(),
                self.nbasis()
            )));
        }
        if occ_mo.cols() == 0 {
            return Err(EngineError::new("occupied MO block has no columns"));
        }
        Ok(())
    }

    /// J_mn = Σ_ls (mn|ls) D_ls for D = C·Cᵀ.
    fn coulomb_from_density(&self, d: &Matrix) -> Matrix {
        let n = self.nbasis();
        self.symmetric(|m, nn| {
            let mut acc = 0.0;
            for l in 0..n {
                for s in 0..n {
                    acc += self.tei_value(m, nn, l, s) * d.get(l, s);
                }
            }
            acc
        })
    }

    /// K_mn = Σ_ls (ml|ns) D_ls for D = C·Cᵀ.
    fn exchange_from_density(&self, d: &Matrix) -> Matrix {
        let n = self.nbasis();
        self.symmetric(|m, nn| {
            let mut acc = 0.0;
            for l in 0..n {
                for s in 0..n {
                    acc += self.tei_value(m, l, nn, s) * d.get(l, s);
                }
            }
            acc
        })
    }

    fn density_from(occ: &Matrix) -> Matrix {
        occ.matmul(&occ.transposed())
    }

    /// Occupied columns of C (the first `nocc`).
    fn occupied_block(c: &Matrix, nocc: usize) -> Matrix {
        Matrix::from_fn(c.rows(), nocc, |i, j| c.get(i, j))
    }
}

impl fmt::Debug for ModelEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelEngine")
            .field("natom", &self.atoms.len())
            .field("basis", &self.basis_name)
            .field("nbasis", &self.funcs.len())
            .field("scf_converged", &self.scf.is_some())
            .finish()
    }
}

// ── Parsing and basis assignment ──────────────────────────────────────────

fn parse_molecule(spec: &str) -> EngineResult<Vec<Atom>> {
    let mut atoms = Vec::new();
    for (idx, line) in spec.lines().enumerate() {
        let line_num = idx + 1;
        let content = line.trim();
        if content.is_empty() || content.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = content.split_whitespace().collect();
        if fields.len() != 4 {
            return Err(EngineError::new(format!(
                "molecule line {line_num}: expected 'Symbol x y z', got {} field(s)",
                fields.len()
            )));
        }
        let z = element_number(fields[0]).ok_or_else(|| {
            EngineError::new(format!(
                "molecule line {line_num}: unknown element '{}'",
                fields[0]
            ))
        })?;
        let mut pos = [0.0f64; 3];
        for (axis, field) in fields[1..].iter().enumerate() {
            pos[axis] = field.parse::<f64>().map_err(|_| {
                EngineError::new(format!(
                    "molecule line {line_num}: '{field}' is not a coordinate"
                ))
            })?;
        }
        atoms.push(Atom { z, pos });
    }
    if atoms.is_empty() {
        return Err(EngineError::new("molecule specification contains no atoms"));
    }
    Ok(atoms)
}

/// Angular-momentum pattern of one shell block for element z:
/// 1 s-function up to He, an s + p shell up to Ne, two such shells up to Ar.
fn shell_pattern(z: usize) -> &'static [usize] {
    match z {
        1..=2 => &[0],
        3..=10 => &[0, 0, 1, 1, 1],
        _ => &[0, 0, 1, 1, 1, 0, 1, 1, 1],
    }
}

fn assign_basis(atoms: &[Atom], basis_name: &str) -> EngineResult<Vec<BasisFunction>> {
    // `repeats` = how many scaled copies of the shell pattern each atom gets.
    let repeats = match basis_name.to_ascii_lowercase().as_str() {
        "sto-3g" => 1,
        "6-31g" => 2,
        other => {
            return Err(EngineError::new(format!("unknown basis set '{other}'")));
        }
    };

    let mut funcs = Vec::new();
    for (atom_idx, atom) in atoms.iter().enumerate() {
        for copy in 0..repeats {
            for (pos_in_shell, &am) in shell_pattern(atom.z).iter().enumerate() {
                let alpha = 0.4
                    + 0.15 * atom.z as f64 / (1.0 + am as f64)
                        / (1.0 + 0.7 * copy as f64)
                        / (1.0 + 0.05 * pos_in_shell as f64);
                funcs.push(BasisFunction {
                    atom: atom_idx,
                    am,
                    alpha,
                });
            }
        }
    }
    Ok(funcs)
}

fn dist2(a: [f64; 3], b: [f64; 3]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    dx * dx + dy * dy + dz * dz
}

// ── Symmetric eigensolver (cyclic Jacobi) ─────────────────────────────────

/// Eigenvalues and eigenvectors (columns) of a symmetric matrix, ascending.
fn jacobi_eigh(m: &Matrix) -> EngineResult<(Vec<f64>, Matrix)> {
    let n = m.rows();
    let mut a = m.clone();
    let mut v = Matrix::from_fn(n, n, |i, j| if i == j { 1.0 } else { 0.0 });

    for _sweep in 0..100 {
        let mut off = 0.0;
        for p in 0..n {
            for q in (p + 1)..n {
                off += a.get(p, q) * a.get(p, q);
            }
        }
        if off < 1e-22 {
            let mut order: Vec<usize> = (0..n).collect();
            order.sort_by(|&x, &y| {
                a.get(x, x)
                    .partial_cmp(&a.get(y, y))
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            let evals = order.iter().map(|&i| a.get(i, i)).collect();
            let evecs = Matrix::from_fn(n, n, |i, j| v.get(i, order[j]));
            return Ok((evals, evecs));
        }

        for p in 0..n {
            for q in (p + 1)..n {
                let apq = a.get(p, q);
                if apq.abs() < 1e-300 {
                    continue;
                }
                let tau = (a.get(q, q) - a.get(p, p)) / (2.0 * apq);
                let t = tau.signum() / (tau.abs() + (1.0 + tau * tau).sqrt());
                let c = 1.0 / (1.0 + t * t).sqrt();
                let s = t * c;

                for i in 0..n {
                    let api = a.get(p, i);
                    let aqi = a.get(q, i);
                    a.set(p, i, c * api - s * aqi);
                    a.set(q, i, s * api + c * aqi);
                }
                for i in 0..n {
                    let aip = a.get(i, p);
                    let aiq = a.get(i, q);
                    a.set(i, p, c * aip - s * aiq);
                    a.set(i, q, s * aip + c * aiq);
                }
                for i in 0..n {
                    let vip = v.get(i, p);
                    let viq = v.get(i, q);
                    v.set(i, p, c * vip - s * viq);
                    v.set(i, q, s * vip + c * viq);
                }
            }
        }
    }

    Err(EngineError::new("eigensolver did not converge in 100 sweeps"))
}

/// S^(-1/2) by eigendecomposition. Rejects near-singular overlap matrices.
fn inverse_sqrt(s: &Matrix) -> EngineResult<Matrix> {
    let (evals, evecs) = jacobi_eigh(s)?;
    if evals.iter().any(|&e| e < 1e-10) {
        return Err(EngineError::new(
            "overlap matrix is near-singular: linearly dependent basis set",
        ));
    }
    let n = s.rows();
    let scaled = Matrix::from_fn(n, n, |i, j| evecs.get(i, j) / evals[j].sqrt());
    Ok(scaled.matmul(&evecs.transposed()))
}

// ── Engine implementation ─────────────────────────────────────────────────

const SCF_ENERGY_TOL: f64 = 1e-8;
const SCF_MAX_ITER: usize = 200;
const SCF_DAMPING: f64 = 0.3;

impl Engine for ModelEngine {
    fn box_clone(&self) -> Box<dyn Engine> {
        Box::new(self.clone())
    }

    fn natom(&self) -> usize {
        self.atoms.len()
    }

    fn nelec(&self) -> usize {
        self.atoms.iter().map(|a| a.z).sum()
    }

    fn enuc(&self) -> f64 {
        let mut e = 0.0;
        for i in 0..self.atoms.len() {
            for j in (i + 1)..self.atoms.len() {
                let r = dist2(self.atoms[i].pos, self.atoms[j].pos).sqrt();
                e += (self.atoms[i].z * self.atoms[j].z) as f64 / r;
            }
        }
        e
    }

    fn coord(&self) -> Matrix {
        Matrix::from_fn(self.atoms.len(), 3, |i, j| self.atoms[i].pos[j])
    }

    fn zlist(&self) -> Vec<f64> {
        self.atoms.iter().map(|a| a.z as f64).collect()
    }

    fn testmol(&self) {
        println!(
            "Molecule: {} atom(s), {} electron(s), basis {} ({} functions)",
            self.natom(),
            self.nelec(),
            self.basis_name,
            self.nbasis()
        );
        for atom in &self.atoms {
            println!(
                "  {:<2} {:>12.6} {:>12.6} {:>12.6}",
                ELEMENTS[atom.z - 1],
                atom.pos[0],
                atom.pos[1],
                atom.pos[2]
            );
        }
    }

    fn nbasis(&self) -> usize {
        self.funcs.len()
    }

    fn func2center(&self) -> Vec<usize> {
        self.funcs.iter().map(|f| f.atom).collect()
    }

    fn func2am(&self) -> Vec<usize> {
        self.funcs.iter().map(|f| f.am).collect()
    }

    fn overlap(&self) -> EngineResult<Matrix> {
        Ok(self.symmetric(|i, j| self.pair_overlap(i, j)))
    }

    fn kinetic(&self) -> EngineResult<Matrix> {
        Ok(self.symmetric(|i, j| self.pair_kinetic(i, j)))
    }

    fn potential(&self) -> EngineResult<Matrix> {
        Ok(self.symmetric(|i, j| {
            self.atoms
                .iter()
                .map(|a| self.pair_attraction(i, j, a.z as f64, a.pos))
                .sum()
        }))
    }

    fn potential_sep(&self) -> EngineResult<Vec<Matrix>> {
        Ok(self
            .atoms
            .iter()
            .map(|a| self.symmetric(|i, j| self.pair_attraction(i, j, a.z as f64, a.pos)))
            .collect())
    }

    fn potential_point_charge(&self, charge: f64, x: f64, y: f64, z: f64) -> EngineResult<Matrix> {
        Ok(self.symmetric(|i, j| self.pair_attraction(i, j, charge, [x, y, z])))
    }

    fn potential_point_charges(&self, charges: &Matrix) -> EngineResult<Matrix> {
        if charges.cols() != 4 {
            return Err(EngineError::new(format!(
                "point-charge list must have 4 columns {{charge,x,y,z}}, got {}",
                charges.cols()
            )));
        }
        Ok(self.symmetric(|i, j| {
            (0..charges.rows())
                .map(|row| {
                    let q = charges.get(row, 0);
                    let r = [charges.get(row, 1), charges.get(row, 2), charges.get(row, 3)];
                    self.pair_attraction(i, j, q, r)
                })
                .sum()
        }))
    }

    fn dipole(&self) -> EngineResult<[Matrix; 3]> {
        let axis = |t: usize| self.symmetric(|i, j| self.pair_overlap(i, j) * self.pair_center(i, j)[t]);
        Ok([axis(0), axis(1), axis(2)])
    }

    fn tei(&self, i: usize, j: usize, k: usize, l: usize) -> EngineResult<f64> {
        for (idx, what) in [(i, "i"), (j, "j"), (k, "k"), (l, "l")] {
            self.check_index(idx, what)?;
        }
        Ok(self.tei_value(i, j, k, l))
    }

    fn tei_uniq_count(&self) -> usize {
        let npair = self.nbasis() * (self.nbasis() + 1) / 2;
        npair * (npair + 1) / 2
    }

    fn tei_alluniq(&self, out: &mut [f64]) -> EngineResult<()> {
        check_buffer(out.len(), self.tei_uniq_count(), "unique TEI")?;
        let mut idx = 0;
        for_each_unique(self.nbasis(), |i, j, k, l| {
            out[idx] = self.tei_value(i, j, k, l);
            idx += 1;
        });
        Ok(())
    }

    fn tei_allfull(&self, out: &mut [f64]) -> EngineResult<()> {
        let n = self.nbasis();
        check_buffer(out.len(), n * n * n * n, "full TEI")?;
        let mut idx = 0;
        for i in 0..n {
            for j in 0..n {
                for k in 0..n {
                    for l in 0..n {
                        out[idx] = self.tei_value(i, j, k, l);
                        idx += 1;
                    }
                }
            }
        }
        Ok(())
    }

    fn tei_alluniq_jk(&self, out_j: &mut [f64], out_k: &mut [f64]) -> EngineResult<()> {
        let count = self.tei_uniq_count();
        check_buffer(out_j.len(), count, "unique TEI (Coulomb)")?;
        check_buffer(out_k.len(), count, "unique TEI (exchange)")?;
        let mut idx = 0;
        for_each_unique(self.nbasis(), |i, j, k, l| {
            out_j[idx] = self.tei_value(i, j, k, l);
            out_k[idx] = self.tei_value(i, k, j, l);
            idx += 1;
        });
        Ok(())
    }

    fn occ_mo_to_j(&self, occ_mo: &Matrix) -> EngineResult<Matrix> {
        self.check_occ_block(occ_mo)?;
        Ok(self.coulomb_from_density(&Self::density_from(occ_mo)))
    }

    fn occ_mo_to_k(&self, occ_mo: &Matrix) -> EngineResult<Matrix> {
        self.check_occ_block(occ_mo)?;
        Ok(self.exchange_from_density(&Self::density_from(occ_mo)))
    }

    fn occ_mo_to_g(&self, occ_mo: &Matrix) -> EngineResult<Matrix> {
        self.check_occ_block(occ_mo)?;
        let d = Self::density_from(occ_mo);
        let j = self.coulomb_from_density(&d);
        let k = self.exchange_from_density(&d);
        let n = self.nbasis();
        Ok(Matrix::from_fn(n, n, |r, c| 2.0 * j.get(r, c) - k.get(r, c)))
    }

    fn rhf(&mut self) -> EngineResult<f64> {
        let n = self.nbasis();
        if self.nelec() % 2 != 0 {
            return Err(EngineError::new(format!(
                "restricted SCF requires an even electron count, molecule has {}",
                self.nelec()
            )));
        }
        let nocc = self.nelec() / 2;
        if nocc > n {
            return Err(EngineError::new(format!(
                "{nocc} occupied orbitals cannot fit in {n} basis functions"
            )));
        }

        let s = self.overlap()?;
        let t = self.kinetic()?;
        let v = self.potential()?;
        let h = Matrix::from_fn(n, n, |i, j| t.get(i, j) + v.get(i, j));

        let x = match self.scf_scratch.take() {
            Some(cached) => cached,
            None => inverse_sqrt(&s)?,
        };

        let mut f = h.clone();
        let mut energy_prev = f64::INFINITY;
        for _iter in 0..SCF_MAX_ITER {
            // Diagonalize in the orthogonal basis, back-transform.
            let f_ortho = x.transposed().matmul(&f).matmul(&x);
            let (emo, c_ortho) = jacobi_eigh(&f_ortho)?;
            let c = x.matmul(&c_ortho);

            let occ = Self::occupied_block(&c, nocc);
            let d = Self::density_from(&occ);
            let j = self.coulomb_from_density(&d);
            let k = self.exchange_from_density(&d);
            let f_new = Matrix::from_fn(n, n, |r, cc| {
                h.get(r, cc) + 2.0 * j.get(r, cc) - k.get(r, cc)
            });

            let mut e_elec = 0.0;
            for r in 0..n {
                for cc in 0..n {
                    e_elec += d.get(r, cc) * (h.get(r, cc) + f_new.get(r, cc));
                }
            }
            let energy = e_elec + self.enuc();

            if (energy - energy_prev).abs() < SCF_ENERGY_TOL {
                self.scf = Some(ScfResults {
                    energy,
                    c,
                    emo,
                    d,
                    h,
                    j,
                    k,
                    f: f_new,
                });
                self.scf_scratch = Some(x);
                return Ok(energy);
            }
            energy_prev = energy;
            f = Matrix::from_fn(n, n, |r, cc| {
                (1.0 - SCF_DAMPING) * f_new.get(r, cc) + SCF_DAMPING * f.get(r, cc)
            });
        }

        Err(EngineError::new(format!(
            "SCF did not converge in {SCF_MAX_ITER} iterations"
        )))
    }

    fn rhf_finalize(&mut self) {
        self.scf_scratch = None;
    }

    fn rhf_energy(&self) -> EngineResult<f64> {
        Ok(self.scf_ref()?.energy)
    }

    fn rhf_coefficients(&self) -> EngineResult<Matrix> {
        Ok(self.scf_ref()?.c.clone())
    }

    fn rhf_orbital_energies(&self) -> EngineResult<Vec<f64>> {
        Ok(self.scf_ref()?.emo.clone())
    }

    fn rhf_density(&self) -> EngineResult<Matrix> {
        Ok(self.scf_ref()?.d.clone())
    }

    fn rhf_core_hamiltonian(&self) -> EngineResult<Matrix> {
        Ok(self.scf_ref()?.h.clone())
    }

    fn rhf_coulomb(&self) -> EngineResult<Matrix> {
        Ok(self.scf_ref()?.j.clone())
    }

    fn rhf_exchange(&self) -> EngineResult<Matrix> {
        Ok(self.scf_ref()?.k.clone())
    }

    fn rhf_fock(&self) -> EngineResult<Matrix> {
        Ok(self.scf_ref()?.f.clone())
    }
}

impl ModelEngine {
    fn scf_ref(&self) -> EngineResult<&ScfResults> {
        self.scf
            .as_ref()
            .ok_or_else(|| EngineError::new("SCF has not been run for this instance"))
    }
}

// ── Shared helpers ────────────────────────────────────────────────────────

fn check_buffer(got: usize, expect: usize, what: &str) -> EngineResult<()> {
    if got != expect {
        return Err(EngineError::new(format!(
            "{what} buffer has {got} elements, expected {expect}"
        )));
    }
    Ok(())
}

/// Visit every symmetry-unique quadruple in canonical order:
/// i ≥ j, k bounded by i, l bounded by k (or by j when k == i).
fn for_each_unique(n: usize, mut visit: impl FnMut(usize, usize, usize, usize)) {
    for i in 0..n {
        for j in 0..=i {
            for k in 0..=i {
                let lmax = if k == i { j } else { k };
                for l in 0..=lmax {
                    visit(i, j, k, l);
                }
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
