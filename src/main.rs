use qcbridge::bridge::{Bridge, BridgeError, Reply, Request};
use qcbridge::core::{Handle, HostArray};

fn main() {
    let args: Vec<String> = std::env::args().collect();
    print_banner();

    match args.get(1).map(String::as_str) {
        None | Some("demo") => run_all_demos(),
        Some("run") => cli_run(args.get(2).map(String::as_str)),
        Some("help") | Some("--help") => print_help(),
        Some(unknown) => {
            eprintln!("Unknown command '{}'. Run 'qcbridge help' for usage.", unknown);
            std::process::exit(1);
        }
    }
}

// ── CLI ───────────────────────────────────────────────────────────────────

fn cli_run(path: Option<&str>) {
    let path = match path {
        Some(p) => p,
        None => {
            eprintln!("Usage: qcbridge run <file.qcs>");
            std::process::exit(1);
        }
    };

    let source = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => { eprintln!("Cannot read '{}': {}", path, e); std::process::exit(1); }
    };

    println!("━━━ qcbridge Script Runner ━━━━━━━━━━━━━━━━━━━━━━");
    println!("File: {path}\n");

    let mut bridge = Bridge::with_model_engine();
    let mut current: Option<Handle> = None;

    for (idx, line) in source.lines().enumerate() {
        let line_num = idx + 1;
        let content = line.trim();
        if content.is_empty() || content.starts_with('#') {
            continue;
        }

        let request = match script_request(content, current) {
            Ok(r) => r,
            Err(msg) => {
                eprintln!("line {line_num}: {msg}");
                std::process::exit(1);
            }
        };

        println!("> {content}");
        match bridge.call(&request) {
            Ok(reply) => {
                current = track_handle(&request.command, current, &reply);
                print_reply(&reply);
            }
            Err(e) => {
                eprintln!("line {line_num}: {e}");
                std::process::exit(1);
            }
        }
    }

    println!("Done. {} live instance(s) remain.", bridge.live_instances());
}

/// Translate one script line into a protocol request. The `new` line carries
/// the basis name first, then `;`-separated atom lines; every other command
/// takes numeric arguments and the threaded current handle.
fn script_request(line: &str, current: Option<Handle>) -> Result<Request, String> {
    let mut fields = line.split_whitespace();
    let command = fields
        .next()
        .ok_or_else(|| "empty command".to_string())?;

    if command == "new" {
        let basis = fields
            .next()
            .ok_or_else(|| "new needs a basis name, then ';'-separated atoms".to_string())?;
        let molecule = fields.collect::<Vec<_>>().join(" ").replace(';', "\n");
        if molecule.trim().is_empty() {
            return Err("new needs at least one 'Symbol x y z' atom entry".to_string());
        }
        return Ok(Request::new("new").arg_str(molecule).arg_str(basis));
    }

    let mut request = Request::new(command);
    if let Some(h) = current {
        request = request.with_handle(h);
    }
    for field in fields {
        let v: f64 = field
            .parse()
            .map_err(|_| format!("'{field}' is not a numeric argument"))?;
        request = request.arg_num(v);
    }
    Ok(request)
}

/// Thread the session handle: `new` and `copy` replace it, `delete` drops it.
fn track_handle(command: &str, current: Option<Handle>, reply: &Reply) -> Option<Handle> {
    match command {
        "new" | "copy" => reply
            .outputs
            .first()
            .and_then(|o| o.scalar_value())
            .and_then(Handle::from_scalar),
        "delete" => None,
        _ => current,
    }
}

fn print_reply(reply: &Reply) {
    for warning in &reply.warnings {
        println!("  warning: {warning}");
    }
    for output in &reply.outputs {
        print_array(output);
    }
}

fn print_array(a: &HostArray) {
    if let Some(v) = a.scalar_value() {
        println!("  {v:.10}");
    } else if a.dims().len() == 2 {
        for i in 0..a.rows() {
            let row: Vec<String> = (0..a.cols()).map(|j| format!("{:>11.6}", a.get2(i, j))).collect();
            println!("  {}", row.join(" "));
        }
    } else {
        println!("  {a} ({} elements)", a.len());
    }
}

fn print_banner() {
    println!("╔══════════════════════════════════════════════╗");
    println!("║          qcbridge v0.1.0                     ║");
    println!("║  Quantum-Chemistry Session Host Bridge       ║");
    println!("╚══════════════════════════════════════════════╝");
    println!();
}

fn print_help() {
    println!("Usage: qcbridge [COMMAND] [ARGS]\n");
    println!("Commands:");
    println!("  demo              Run the built-in demonstration session");
    println!("  run <file.qcs>    Execute a line-oriented command script");
    println!("  help              Show this message\n");
    println!("Script format (one command per line, # comments):");
    println!("  new <basis> <Sym> <x> <y> <z> [; <Sym> <x> <y> <z> ...]");
    println!("  natom | nelec | nbasis | Enuc | coord | Zlist | testmol");
    println!("  func2center | func2am | overlap | kinetic | potential");
    println!("  potential_sep | potential_zxyz <q> <x> <y> <z> | dipole");
    println!("  tei_ijkl <i> <j> <k> <l>   (1-based indices)");
    println!("  tei_uniqN | tei_alluniq | tei_allfull | tei_alluniqJK");
    println!("  RHF | RHF_finalize | RHF_EHF | RHF_C | RHF_EMO");
    println!("  RHF_D | RHF_H | RHF_J | RHF_K | RHF_F");
    println!("  copy | delete\n");
    println!("The handle returned by 'new' (or 'copy') is threaded to every");
    println!("following command automatically. Matrix-valued inputs");
    println!("(potential_zxyzlist, OccMO2*) are only reachable through the");
    println!("library API.");
}

// ── Demos ─────────────────────────────────────────────────────────────────

const WATER: &str = "O 0.0 0.0 0.0\nH 0.0 1.43 1.11\nH 0.0 -1.43 1.11";

fn run_all_demos() {
    demo_session();
    demo_integrals();
    demo_scf();
    demo_handles();
}

fn must(result: Result<Reply, BridgeError>) -> Reply {
    match result {
        Ok(r) => r,
        Err(e) => { eprintln!("Demo error: {e}"); std::process::exit(1); }
    }
}

fn scalar_of(reply: &Reply) -> f64 {
    reply.outputs[0].scalar_value().unwrap_or(f64::NAN)
}

fn demo_session() {
    println!("━━━ Demo 1: Session Lifecycle ━━━━━━━━━━━━━━━━━━━");
    let mut bridge = Bridge::with_model_engine();

    let reply = must(bridge.call(&Request::new("new").arg_str(WATER).arg_str("sto-3g")));
    let h = Handle::from_scalar(scalar_of(&reply)).unwrap_or_else(|| {
        eprintln!("Demo error: malformed handle scalar");
        std::process::exit(1);
    });
    println!("Constructed water / STO-3G under handle {h}");

    must(bridge.call(&Request::new("testmol").with_handle(h)));
    println!(
        "natom={}  nelec={}  nbasis={}",
        scalar_of(&must(bridge.call(&Request::new("natom").with_handle(h)))),
        scalar_of(&must(bridge.call(&Request::new("nelec").with_handle(h)))),
        scalar_of(&must(bridge.call(&Request::new("nbasis").with_handle(h)))),
    );
    println!(
        "Nuclear repulsion energy: {:.8}",
        scalar_of(&must(bridge.call(&Request::new("Enuc").with_handle(h))))
    );

    let owners = must(bridge.call(&Request::new("func2center").with_handle(h)));
    println!("func2center (1-based): {:?}", owners.outputs[0].as_slice());

    must(bridge.call(&Request::new("delete").with_handle(h)));
    println!("Deleted. Live instances: {}", bridge.live_instances());
    println!();
}

fn demo_integrals() {
    println!("━━━ Demo 2: Integral Matrices ━━━━━━━━━━━━━━━━━━━");
    let mut bridge = Bridge::with_model_engine();
    let reply = must(bridge.call(&Request::new("new").arg_str(WATER).arg_str("sto-3g")));
    let h = Handle::from_scalar(scalar_of(&reply)).unwrap_or_else(|| std::process::exit(1));

    let overlap = must(bridge.call(&Request::new("overlap").with_handle(h)));
    println!("Overlap matrix ({:?}):", overlap.outputs[0].dims());
    print_array(&overlap.outputs[0]);

    let sep = must(bridge.call(&Request::new("potential_sep").with_handle(h)));
    println!("Per-atom nuclear attraction stacked as {:?}", sep.outputs[0].dims());

    let tei = must(bridge.call(
        &Request::new("tei_ijkl")
            .with_handle(h)
            .arg_num(1.0)
            .arg_num(1.0)
            .arg_num(2.0)
            .arg_num(2.0),
    ));
    println!("(11|22) = {:.10}", scalar_of(&tei));

    let count = must(bridge.call(&Request::new("tei_uniqN").with_handle(h)));
    println!("Symmetry-unique two-electron integrals: {}", scalar_of(&count));
    println!();
}

fn demo_scf() {
    println!("━━━ Demo 3: SCF Procedure ━━━━━━━━━━━━━━━━━━━━━━━");
    let mut bridge = Bridge::with_model_engine();
    let reply = must(bridge.call(&Request::new("new").arg_str(WATER).arg_str("sto-3g")));
    let h = Handle::from_scalar(scalar_of(&reply)).unwrap_or_else(|| std::process::exit(1));

    let energy = scalar_of(&must(bridge.call(&Request::new("RHF").with_handle(h))));
    println!("Converged RHF energy: {energy:.10}");

    must(bridge.call(&Request::new("RHF_finalize").with_handle(h)));
    let emo = must(bridge.call(&Request::new("RHF_EMO").with_handle(h)));
    println!("Orbital energies: {:?}", emo.outputs[0].as_slice());

    let c = must(bridge.call(&Request::new("RHF_C").with_handle(h)));
    println!("MO coefficients ({:?}):", c.outputs[0].dims());
    print_array(&c.outputs[0]);
    println!();
}

fn demo_handles() {
    println!("━━━ Demo 4: Handles and Error Reporting ━━━━━━━━━");
    let mut bridge = Bridge::with_model_engine();
    let reply = must(bridge.call(&Request::new("new").arg_str(WATER).arg_str("sto-3g")));
    let h = Handle::from_scalar(scalar_of(&reply)).unwrap_or_else(|| std::process::exit(1));

    let copy_reply = must(bridge.call(&Request::new("copy").with_handle(h)));
    let copy = Handle::from_scalar(scalar_of(&copy_reply)).unwrap_or_else(|| std::process::exit(1));
    println!("Copied {h} into independent instance {copy}");
    println!("Live instances: {}", bridge.live_instances());

    must(bridge.call(&Request::new("delete").with_handle(h)));
    match bridge.call(&Request::new("natom").with_handle(h)) {
        Err(e) => println!("Stale handle detected as expected: {e}"),
        Ok(_) => println!("Unexpected success on a deleted handle"),
    }

    match bridge.call(
        &Request::new("tei_ijkl")
            .with_handle(copy)
            .arg_num(99.0)
            .arg_num(1.0)
            .arg_num(1.0)
            .arg_num(1.0),
    ) {
        Err(e) => println!("Out-of-range index rejected: {e}"),
        Ok(_) => println!("Unexpected success on an out-of-range index"),
    }

    must(bridge.call(&Request::new("delete").with_handle(copy)));
    println!("Cleanup complete. Live instances: {}", bridge.live_instances());
    println!();
}
