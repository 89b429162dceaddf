/// Request validation, routing, and result conversion.
///
/// Each call is independent: resolve the command token, check arity and
/// argument types, resolve the handle, invoke the engine operation, convert
/// results to host layout. The registry is the only state carried between
/// calls. Engine panics are caught at this boundary and reported as engine
/// failures so the host process survives them.
use std::panic::{catch_unwind, AssertUnwindSafe};

use super::command::Command;
use super::convention;
use super::BridgeError;
use crate::core::{codec, Handle, HandleRegistry, HostArray};
use crate::engine::{Engine, EngineError, ModelEngine};

// ── Protocol types ────────────────────────────────────────────────────────

/// One positional command argument as the host supplies it.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Num(f64),
    Matrix(HostArray),
}

/// One host call: command token, optional instance handle, positional
/// arguments.
#[derive(Debug, Clone)]
pub struct Request {
    pub command: String,
    pub handle: Option<Handle>,
    pub args: Vec<Value>,
}

impl Request {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            handle: None,
            args: Vec::new(),
        }
    }

    pub fn with_handle(mut self, handle: Handle) -> Self {
        self.handle = Some(handle);
        self
    }

    pub fn arg_str(mut self, s: impl Into<String>) -> Self {
        self.args.push(Value::Str(s.into()));
        self
    }

    pub fn arg_num(mut self, v: f64) -> Self {
        self.args.push(Value::Num(v));
        self
    }

    pub fn arg_matrix(mut self, m: HostArray) -> Self {
        self.args.push(Value::Matrix(m));
        self
    }
}

/// The result of a successful dispatch: zero or more freshly owned host
/// arrays, plus any non-fatal warnings raised along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub outputs: Vec<HostArray>,
    pub warnings: Vec<String>,
}

impl Reply {
    fn with_outputs(outputs: Vec<HostArray>) -> Self {
        Self {
            outputs,
            warnings: Vec::new(),
        }
    }
}

// ── Bridge ────────────────────────────────────────────────────────────────

/// Constructs a fresh engine instance from a molecule spec and a basis name.
pub type EngineFactory = Box<dyn Fn(&str, &str) -> Result<Box<dyn Engine>, EngineError>>;

/// The host-facing entry point: owns the handle registry and the engine
/// factory, dispatches one request at a time.
pub struct Bridge {
    registry: HandleRegistry<Box<dyn Engine>>,
    factory: EngineFactory,
}

impl Bridge {
    pub fn new(factory: EngineFactory) -> Self {
        Self {
            registry: HandleRegistry::new(),
            factory,
        }
    }

    /// A bridge backed by the built-in deterministic model engine.
    pub fn with_model_engine() -> Self {
        Self::new(Box::new(|mol, basis| {
            ModelEngine::new(mol, basis).map(|e| Box::new(e) as Box<dyn Engine>)
        }))
    }

    /// Number of live instances in the registry.
    pub fn live_instances(&self) -> usize {
        self.registry.len()
    }

    /// Dispatch one request. Any panic escaping the engine is converted to
    /// an engine-failure error here instead of unwinding into the host.
    pub fn call(&mut self, req: &Request) -> Result<Reply, BridgeError> {
        let command = req.command.clone();
        match catch_unwind(AssertUnwindSafe(|| self.dispatch(req))) {
            Ok(result) => result,
            Err(_) => Err(BridgeError::Engine {
                command,
                msg: "internal fault during dispatch".into(),
            }),
        }
    }

    fn dispatch(&mut self, req: &Request) -> Result<Reply, BridgeError> {
        let cmd = Command::lookup(&req.command).ok_or_else(|| BridgeError::UnknownCommand {
            command: req.command.clone(),
        })?;
        let name = cmd.name();

        let argument = |msg: String| BridgeError::Argument {
            command: name.to_string(),
            msg,
        };
        let engine_failure = |e: EngineError| BridgeError::Engine {
            command: name.to_string(),
            msg: e.msg,
        };
        let shape = |e: codec::ShapeError| BridgeError::Shape {
            command: name.to_string(),
            msg: e.msg,
        };

        // Arity first; `delete` is the single lenient command and is handled
        // in its own arm below.
        if cmd != Command::Delete && req.args.len() != cmd.input_arity() {
            return Err(argument(format!(
                "expects {} argument(s), got {}",
                cmd.input_arity(),
                req.args.len()
            )));
        }

        // Lifecycle commands touch the registry itself.
        match cmd {
            Command::New => {
                if req.handle.is_some() {
                    return Err(argument("does not take an instance handle".into()));
                }
                let mol = str_arg(&req.args, 0).map_err(&argument)?;
                let basis = str_arg(&req.args, 1).map_err(&argument)?;
                let engine = (self.factory)(mol, basis).map_err(engine_failure)?;
                let handle = self.registry.create(engine);
                return Ok(Reply::with_outputs(vec![HostArray::scalar(
                    handle.as_scalar(),
                )]));
            }
            Command::Delete => {
                let handle = req
                    .handle
                    .ok_or_else(|| argument("requires an instance handle".into()))?;
                if !self.registry.destroy(handle) {
                    return Err(BridgeError::InvalidHandle {
                        command: name.to_string(),
                        handle: handle.raw(),
                    });
                }
                let mut reply = Reply::with_outputs(Vec::new());
                if !req.args.is_empty() {
                    reply.warnings.push(format!(
                        "delete takes no arguments; {} extra argument(s) ignored",
                        req.args.len()
                    ));
                }
                return Ok(reply);
            }
            Command::Copy => {
                let handle = req
                    .handle
                    .ok_or_else(|| argument("requires an instance handle".into()))?;
                let duplicate = self
                    .registry
                    .resolve(handle)
                    .ok_or(BridgeError::InvalidHandle {
                        command: name.to_string(),
                        handle: handle.raw(),
                    })?
                    .box_clone();
                let fresh = self.registry.create(duplicate);
                return Ok(Reply::with_outputs(vec![HostArray::scalar(
                    fresh.as_scalar(),
                )]));
            }
            _ => {}
        }

        // Everything else operates on one resolved instance.
        let handle = req
            .handle
            .ok_or_else(|| argument("requires an instance handle".into()))?;
        let engine = self
            .registry
            .resolve(handle)
            .ok_or(BridgeError::InvalidHandle {
                command: name.to_string(),
                handle: handle.raw(),
            })?;

        let outputs = match cmd {
            Command::Testmol => {
                engine.testmol();
                Vec::new()
            }

            // ── Molecule properties ────────────────────────────────────
            Command::Natom => vec![HostArray::scalar(engine.natom() as f64)],
            Command::Nelec => vec![HostArray::scalar(engine.nelec() as f64)],
            Command::Enuc => vec![HostArray::scalar(engine.enuc())],
            Command::Coord => vec![codec::to_host(&engine.coord())],
            Command::Zlist => vec![codec::to_host_vector(&engine.zlist())],

            // ── Basis set properties ───────────────────────────────────
            Command::Nbasis => vec![HostArray::scalar(engine.nbasis() as f64)],
            Command::Func2Center => {
                let shifted = convention::indices_to_host(&engine.func2center());
                vec![codec::to_host_vector(&shifted)]
            }
            Command::Func2Am => {
                let am: Vec<f64> = engine.func2am().iter().map(|&l| l as f64).collect();
                vec![codec::to_host_vector(&am)]
            }

            // ── One-electron integrals ─────────────────────────────────
            Command::Overlap => {
                let m = engine.overlap().map_err(engine_failure)?;
                vec![codec::to_host_symmetric_full(&m).map_err(shape)?]
            }
            Command::Kinetic => {
                let m = engine.kinetic().map_err(engine_failure)?;
                vec![codec::to_host_symmetric_full(&m).map_err(shape)?]
            }
            Command::Potential => {
                let m = engine.potential().map_err(engine_failure)?;
                vec![codec::to_host_symmetric_full(&m).map_err(shape)?]
            }
            Command::PotentialSep => {
                let slices = engine.potential_sep().map_err(engine_failure)?;
                vec![codec::pack_by_leading_index(&slices).map_err(shape)?]
            }
            Command::PotentialZxyz => {
                let q = num_arg(&req.args, 0).map_err(&argument)?;
                let x = num_arg(&req.args, 1).map_err(&argument)?;
                let y = num_arg(&req.args, 2).map_err(&argument)?;
                let z = num_arg(&req.args, 3).map_err(&argument)?;
                let m = engine
                    .potential_point_charge(q, x, y, z)
                    .map_err(engine_failure)?;
                vec![codec::to_host_symmetric_full(&m).map_err(shape)?]
            }
            Command::PotentialZxyzList => {
                let host = matrix_arg(&req.args, 0).map_err(&argument)?;
                let charges = codec::to_engine(host).map_err(shape)?;
                if charges.cols() != 4 {
                    return Err(argument(format!(
                        "point-charge list must be N x 4 {{charge,x,y,z}}, got {} column(s)",
                        charges.cols()
                    )));
                }
                let m = engine
                    .potential_point_charges(&charges)
                    .map_err(engine_failure)?;
                vec![codec::to_host_symmetric_full(&m).map_err(shape)?]
            }
            Command::Dipole => {
                let axes = engine.dipole().map_err(engine_failure)?;
                let mut out = Vec::with_capacity(3);
                for m in &axes {
                    out.push(codec::to_host_symmetric_full(m).map_err(shape)?);
                }
                out
            }

            // ── Two-electron integrals ─────────────────────────────────
            Command::TeiIjkl => {
                let nbasis = engine.nbasis();
                let mut indices = [0usize; 4];
                for (slot, idx) in indices.iter_mut().enumerate() {
                    let v = num_arg(&req.args, slot).map_err(&argument)?;
                    *idx =
                        convention::index_to_engine(v, nbasis, "basis function").map_err(&argument)?;
                }
                let v = engine
                    .tei(indices[0], indices[1], indices[2], indices[3])
                    .map_err(engine_failure)?;
                vec![HostArray::scalar(v)]
            }
            Command::TeiUniqN => vec![HostArray::scalar(engine.tei_uniq_count() as f64)],
            Command::TeiAllUniq => {
                let mut buf = vec![0.0; engine.tei_uniq_count()];
                engine.tei_alluniq(&mut buf).map_err(engine_failure)?;
                vec![codec::to_host_vector(&buf)]
            }
            Command::TeiAllFull => {
                let n = engine.nbasis();
                let mut buf = vec![0.0; n * n * n * n];
                engine.tei_allfull(&mut buf).map_err(engine_failure)?;
                vec![codec::pack_tensor4_full(buf, n).map_err(shape)?]
            }
            Command::TeiAllUniqJk => {
                let count = engine.tei_uniq_count();
                let mut buf_j = vec![0.0; count];
                let mut buf_k = vec![0.0; count];
                engine
                    .tei_alluniq_jk(&mut buf_j, &mut buf_k)
                    .map_err(engine_failure)?;
                vec![codec::to_host_vector(&buf_j), codec::to_host_vector(&buf_k)]
            }

            // ── Density contractions ───────────────────────────────────
            Command::OccMoToJ | Command::OccMoToK | Command::OccMoToG => {
                let host = matrix_arg(&req.args, 0).map_err(&argument)?;
                let occ = codec::to_engine(host).map_err(shape)?;
                if occ.rows() != engine.nbasis() {
                    return Err(argument(format!(
                        "occupied MO block has {} row(s), expected nbasis = {}",
                        occ.rows(),
                        engine.nbasis()
                    )));
                }
                let m = match cmd {
                    Command::OccMoToJ => engine.occ_mo_to_j(&occ),
                    Command::OccMoToK => engine.occ_mo_to_k(&occ),
                    _ => engine.occ_mo_to_g(&occ),
                }
                .map_err(engine_failure)?;
                vec![codec::to_host_symmetric_full(&m).map_err(shape)?]
            }

            // ── SCF ────────────────────────────────────────────────────
            Command::Rhf => vec![HostArray::scalar(engine.rhf().map_err(engine_failure)?)],
            Command::RhfFinalize => {
                engine.rhf_finalize();
                Vec::new()
            }
            Command::RhfEnergy => {
                vec![HostArray::scalar(
                    engine.rhf_energy().map_err(engine_failure)?,
                )]
            }
            Command::RhfCoefficients => {
                vec![codec::to_host(&engine.rhf_coefficients().map_err(engine_failure)?)]
            }
            Command::RhfOrbitalEnergies => {
                let emo = engine.rhf_orbital_energies().map_err(engine_failure)?;
                vec![codec::to_host_vector(&emo)]
            }
            Command::RhfDensity => {
                let m = engine.rhf_density().map_err(engine_failure)?;
                vec![codec::to_host_symmetric_full(&m).map_err(shape)?]
            }
            Command::RhfCoreHamiltonian => {
                let m = engine.rhf_core_hamiltonian().map_err(engine_failure)?;
                vec![codec::to_host_symmetric_full(&m).map_err(shape)?]
            }
            Command::RhfCoulomb => {
                let m = engine.rhf_coulomb().map_err(engine_failure)?;
                vec![codec::to_host_symmetric_full(&m).map_err(shape)?]
            }
            Command::RhfExchange => {
                let m = engine.rhf_exchange().map_err(engine_failure)?;
                vec![codec::to_host_symmetric_full(&m).map_err(shape)?]
            }
            Command::RhfFock => {
                let m = engine.rhf_fock().map_err(engine_failure)?;
                vec![codec::to_host_symmetric_full(&m).map_err(shape)?]
            }

            // Lifecycle commands returned earlier.
            Command::New | Command::Delete | Command::Copy => unreachable!(),
        };

        Ok(Reply::with_outputs(outputs))
    }
}

// ── Argument extraction ───────────────────────────────────────────────────

fn str_arg(args: &[Value], idx: usize) -> Result<&str, String> {
    match args.get(idx) {
        Some(Value::Str(s)) => Ok(s),
        _ => Err(format!("argument {} must be a string", idx + 1)),
    }
}

fn num_arg(args: &[Value], idx: usize) -> Result<f64, String> {
    match args.get(idx) {
        Some(Value::Num(v)) => Ok(*v),
        // Hosts routinely hand scalars over as 1x1 arrays.
        Some(Value::Matrix(m)) => m
            .scalar_value()
            .ok_or_else(|| format!("argument {} must be a scalar, got {}", idx + 1, m)),
        _ => Err(format!("argument {} must be a scalar", idx + 1)),
    }
}

fn matrix_arg(args: &[Value], idx: usize) -> Result<&HostArray, String> {
    match args.get(idx) {
        Some(Value::Matrix(m)) => Ok(m),
        _ => Err(format!("argument {} must be a matrix", idx + 1)),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::BridgeError;

    const WATER: &str = "O 0.0 0.0 0.0\nH 0.0 1.43 1.11\nH 0.0 -1.43 1.11";

    fn bridge() -> Bridge {
        Bridge::with_model_engine()
    }

    fn construct(b: &mut Bridge) -> Handle {
        let reply = b
            .call(&Request::new("new").arg_str(WATER).arg_str("sto-3g"))
            .expect("construction should succeed");
        let scalar = reply.outputs[0].scalar_value().expect("handle is a scalar");
        Handle::from_scalar(scalar).expect("handle scalar is well-formed")
    }

    fn call_ok(b: &mut Bridge, req: Request) -> Reply {
        b.call(&req).unwrap_or_else(|e| panic!("{e}"))
    }

    #[test]
    fn test_construct_then_natom() {
        let mut b = bridge();
        let h = construct(&mut b);
        let reply = call_ok(&mut b, Request::new("natom").with_handle(h));
        assert_eq!(reply.outputs[0].scalar_value(), Some(3.0));
        assert_eq!(b.live_instances(), 1);
    }

    #[test]
    fn test_scalar_queries() {
        let mut b = bridge();
        let h = construct(&mut b);
        let nelec = call_ok(&mut b, Request::new("nelec").with_handle(h));
        assert_eq!(nelec.outputs[0].scalar_value(), Some(10.0));
        let nbasis = call_ok(&mut b, Request::new("nbasis").with_handle(h));
        assert_eq!(nbasis.outputs[0].scalar_value(), Some(7.0));
        let enuc = call_ok(&mut b, Request::new("Enuc").with_handle(h));
        assert!(enuc.outputs[0].scalar_value().unwrap() > 0.0);
    }

    #[test]
    fn test_coord_is_natom_by_3() {
        let mut b = bridge();
        let h = construct(&mut b);
        let reply = call_ok(&mut b, Request::new("coord").with_handle(h));
        assert_eq!(reply.outputs[0].dims(), &[3, 3]);
        // Row 1 is the first hydrogen; y coordinate lives at (1, 1)
        assert_eq!(reply.outputs[0].get2(1, 1), 1.43);
    }

    #[test]
    fn test_overlap_is_square_and_symmetric() {
        let mut b = bridge();
        let h = construct(&mut b);
        let reply = call_ok(&mut b, Request::new("overlap").with_handle(h));
        let s = &reply.outputs[0];
        assert_eq!(s.dims(), &[7, 7]);
        for i in 0..7 {
            for j in 0..7 {
                assert!((s.get2(i, j) - s.get2(j, i)).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_func2center_is_one_based() {
        let mut b = bridge();
        let h = construct(&mut b);
        let reply = call_ok(&mut b, Request::new("func2center").with_handle(h));
        let owners = reply.outputs[0].as_slice();
        assert_eq!(owners.len(), 7);
        assert!(owners.iter().all(|&v| (1.0..=3.0).contains(&v)));
        assert_eq!(owners[0], 1.0, "first function belongs to atom 1");
        assert_eq!(owners[6], 3.0, "last function belongs to atom 3");
    }

    #[test]
    fn test_tei_ijkl_shifts_to_zero_based() {
        let mut b = bridge();
        let h = construct(&mut b);
        let via_bridge = call_ok(
            &mut b,
            Request::new("tei_ijkl")
                .with_handle(h)
                .arg_num(1.0)
                .arg_num(1.0)
                .arg_num(1.0)
                .arg_num(1.0),
        );
        let direct = ModelEngine::new(WATER, "sto-3g")
            .unwrap()
            .tei(0, 0, 0, 0)
            .unwrap();
        assert_eq!(via_bridge.outputs[0].scalar_value(), Some(direct));
    }

    #[test]
    fn test_tei_ijkl_rejects_out_of_range() {
        let mut b = bridge();
        let h = construct(&mut b);
        for bad in [0.0, 8.0, -1.0, 2.5] {
            let err = b
                .call(
                    &Request::new("tei_ijkl")
                        .with_handle(h)
                        .arg_num(bad)
                        .arg_num(1.0)
                        .arg_num(1.0)
                        .arg_num(1.0),
                )
                .unwrap_err();
            assert!(
                matches!(err, BridgeError::Argument { .. }),
                "index {bad} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_scalar_args_accepted_as_1x1_arrays() {
        let mut b = bridge();
        let h = construct(&mut b);
        let reply = call_ok(
            &mut b,
            Request::new("tei_ijkl")
                .with_handle(h)
                .arg_matrix(HostArray::scalar(1.0))
                .arg_num(1.0)
                .arg_num(1.0)
                .arg_num(1.0),
        );
        assert!(reply.outputs[0].scalar_value().is_some());
    }

    #[test]
    fn test_potential_sep_stacks_per_atom() {
        let mut b = bridge();
        let h = construct(&mut b);
        let reply = call_ok(&mut b, Request::new("potential_sep").with_handle(h));
        assert_eq!(reply.outputs[0].dims(), &[7, 7, 3]);
    }

    #[test]
    fn test_potential_zxyz_takes_four_scalars() {
        let mut b = bridge();
        let h = construct(&mut b);
        let reply = call_ok(
            &mut b,
            Request::new("potential_zxyz")
                .with_handle(h)
                .arg_num(1.0)
                .arg_num(0.0)
                .arg_num(0.0)
                .arg_num(5.0),
        );
        assert_eq!(reply.outputs[0].dims(), &[7, 7]);

        let err = b
            .call(&Request::new("potential_zxyz").with_handle(h).arg_num(1.0))
            .unwrap_err();
        assert!(matches!(err, BridgeError::Argument { .. }));
    }

    #[test]
    fn test_potential_zxyzlist_validates_columns() {
        let mut b = bridge();
        let h = construct(&mut b);
        // 2 charges, column-major {charge,x,y,z} columns
        let charges = HostArray::matrix(
            2,
            4,
            vec![1.0, 0.5, 0.0, 1.0, 0.0, 1.0, 5.0, -5.0],
        );
        let reply = call_ok(
            &mut b,
            Request::new("potential_zxyzlist")
                .with_handle(h)
                .arg_matrix(charges),
        );
        assert_eq!(reply.outputs[0].dims(), &[7, 7]);

        let bad = HostArray::matrix(2, 3, vec![0.0; 6]);
        let err = b
            .call(
                &Request::new("potential_zxyzlist")
                    .with_handle(h)
                    .arg_matrix(bad),
            )
            .unwrap_err();
        assert!(matches!(err, BridgeError::Argument { .. }));
    }

    #[test]
    fn test_dipole_returns_three_outputs() {
        let mut b = bridge();
        let h = construct(&mut b);
        let reply = call_ok(&mut b, Request::new("dipole").with_handle(h));
        assert_eq!(reply.outputs.len(), 3);
        for m in &reply.outputs {
            assert_eq!(m.dims(), &[7, 7]);
        }
    }

    #[test]
    fn test_tei_bulk_shapes() {
        let mut b = bridge();
        let h = construct(&mut b);
        let count = call_ok(&mut b, Request::new("tei_uniqN").with_handle(h)).outputs[0]
            .scalar_value()
            .unwrap() as usize;
        let npair = 7 * 8 / 2;
        assert_eq!(count, npair * (npair + 1) / 2);

        let uniq = call_ok(&mut b, Request::new("tei_alluniq").with_handle(h));
        assert_eq!(uniq.outputs[0].dims(), &[1, count]);

        let full = call_ok(&mut b, Request::new("tei_allfull").with_handle(h));
        assert_eq!(full.outputs[0].dims(), &[7, 7, 7, 7]);

        let jk = call_ok(&mut b, Request::new("tei_alluniqJK").with_handle(h));
        assert_eq!(jk.outputs.len(), 2);
        assert_eq!(jk.outputs[0].dims(), &[1, count]);
        assert_eq!(jk.outputs[1].dims(), &[1, count]);
    }

    #[test]
    fn test_occ_mo_commands_validate_rows() {
        let mut b = bridge();
        let h = construct(&mut b);
        let occ = HostArray::matrix(7, 2, vec![0.1; 14]);
        for cmd in ["OccMO2J", "OccMO2K", "OccMO2G"] {
            let reply = call_ok(&mut b, Request::new(cmd).with_handle(h).arg_matrix(occ.clone()));
            assert_eq!(reply.outputs[0].dims(), &[7, 7], "{cmd}");
        }

        let bad = HostArray::matrix(3, 2, vec![0.1; 6]);
        let err = b
            .call(&Request::new("OccMO2J").with_handle(h).arg_matrix(bad))
            .unwrap_err();
        assert!(matches!(err, BridgeError::Argument { .. }));
    }

    #[test]
    fn test_scf_end_to_end() {
        let mut b = bridge();
        let h = construct(&mut b);

        let energy = call_ok(&mut b, Request::new("RHF").with_handle(h)).outputs[0]
            .scalar_value()
            .unwrap();
        assert!(energy.is_finite());

        let finalize = call_ok(&mut b, Request::new("RHF_finalize").with_handle(h));
        assert!(finalize.outputs.is_empty());

        let ehf = call_ok(&mut b, Request::new("RHF_EHF").with_handle(h)).outputs[0]
            .scalar_value()
            .unwrap();
        assert!((ehf - energy).abs() < 1e-14);

        let c = call_ok(&mut b, Request::new("RHF_C").with_handle(h));
        assert_eq!(c.outputs[0].rows(), 7);

        let emo = call_ok(&mut b, Request::new("RHF_EMO").with_handle(h));
        assert_eq!(emo.outputs[0].dims(), &[1, 7]);

        for cmd in ["RHF_D", "RHF_H", "RHF_J", "RHF_K", "RHF_F"] {
            let reply = call_ok(&mut b, Request::new(cmd).with_handle(h));
            assert_eq!(reply.outputs[0].dims(), &[7, 7], "{cmd}");
        }
    }

    #[test]
    fn test_scf_accessor_before_run_is_engine_failure() {
        let mut b = bridge();
        let h = construct(&mut b);
        let err = b.call(&Request::new("RHF_EHF").with_handle(h)).unwrap_err();
        assert!(matches!(err, BridgeError::Engine { .. }));
    }

    #[test]
    fn test_delete_invalidates_handle() {
        let mut b = bridge();
        let h = construct(&mut b);
        call_ok(&mut b, Request::new("delete").with_handle(h));
        assert_eq!(b.live_instances(), 0);

        let err = b.call(&Request::new("natom").with_handle(h)).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidHandle { .. }));

        let err = b.call(&Request::new("delete").with_handle(h)).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidHandle { .. }));
    }

    #[test]
    fn test_delete_warns_about_extra_arguments() {
        let mut b = bridge();
        let h = construct(&mut b);
        let reply = call_ok(
            &mut b,
            Request::new("delete").with_handle(h).arg_num(0.0).arg_num(1.0),
        );
        assert_eq!(reply.warnings.len(), 1);
        assert!(reply.warnings[0].contains("2 extra"));
    }

    #[test]
    fn test_copy_is_independent() {
        let mut b = bridge();
        let h = construct(&mut b);
        let reply = call_ok(&mut b, Request::new("copy").with_handle(h));
        let copy = Handle::from_scalar(reply.outputs[0].scalar_value().unwrap()).unwrap();
        assert_ne!(copy, h);
        assert_eq!(b.live_instances(), 2);

        // Run SCF on the copy only; the source must stay untouched.
        call_ok(&mut b, Request::new("RHF").with_handle(copy));
        assert!(b.call(&Request::new("RHF_EHF").with_handle(copy)).is_ok());
        assert!(b.call(&Request::new("RHF_EHF").with_handle(h)).is_err());
    }

    #[test]
    fn test_unknown_command() {
        let mut b = bridge();
        let err = b.call(&Request::new("frobnicate")).unwrap_err();
        assert!(matches!(err, BridgeError::UnknownCommand { .. }));

        let err = b.call(&Request::new("x".repeat(200))).unwrap_err();
        assert!(matches!(err, BridgeError::UnknownCommand { .. }));
    }

    #[test]
    fn test_new_argument_validation() {
        let mut b = bridge();
        let err = b.call(&Request::new("new").arg_str(WATER)).unwrap_err();
        assert!(matches!(err, BridgeError::Argument { .. }));

        let err = b
            .call(&Request::new("new").arg_str(WATER).arg_num(3.0))
            .unwrap_err();
        assert!(matches!(err, BridgeError::Argument { .. }));

        let mut b2 = bridge();
        let h = construct(&mut b2);
        let err = b2
            .call(
                &Request::new("new")
                    .with_handle(h)
                    .arg_str(WATER)
                    .arg_str("sto-3g"),
            )
            .unwrap_err();
        assert!(matches!(err, BridgeError::Argument { .. }));
    }

    #[test]
    fn test_construction_failure_is_engine_error() {
        let mut b = bridge();
        let err = b
            .call(&Request::new("new").arg_str("Xx 0 0 0").arg_str("sto-3g"))
            .unwrap_err();
        assert!(matches!(err, BridgeError::Engine { .. }));
        assert_eq!(b.live_instances(), 0);

        let err = b
            .call(&Request::new("new").arg_str(WATER).arg_str("def2-tzvp"))
            .unwrap_err();
        assert!(matches!(err, BridgeError::Engine { .. }));
    }

    #[test]
    fn test_missing_handle_is_argument_error() {
        let mut b = bridge();
        let err = b.call(&Request::new("natom")).unwrap_err();
        assert!(matches!(err, BridgeError::Argument { .. }));
    }

    #[test]
    fn test_strict_arity_for_plain_queries() {
        let mut b = bridge();
        let h = construct(&mut b);
        let err = b
            .call(&Request::new("natom").with_handle(h).arg_num(1.0))
            .unwrap_err();
        assert!(matches!(err, BridgeError::Argument { .. }));
    }

    #[test]
    fn test_handles_survive_scalar_round_trip() {
        let mut b = bridge();
        let h = construct(&mut b);
        // Re-derive the handle from its host-side scalar form, as a real
        // host would on every call.
        let again = Handle::from_scalar(h.as_scalar()).unwrap();
        let reply = call_ok(&mut b, Request::new("natom").with_handle(again));
        assert_eq!(reply.outputs[0].scalar_value(), Some(3.0));
    }

    #[test]
    fn test_zlist_values() {
        let mut b = bridge();
        let h = construct(&mut b);
        let reply = call_ok(&mut b, Request::new("Zlist").with_handle(h));
        assert_eq!(reply.outputs[0].as_slice(), &[8.0, 1.0, 1.0]);
    }
}
