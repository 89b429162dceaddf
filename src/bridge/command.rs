/// Static command table: every operation the bridge exposes to the host,
/// with its dispatch metadata.
///
/// Replacing a string-keyed if/else chain with one enum keeps the
/// name→descriptor mapping, the arity rules, and the handle requirement in a
/// single place that tests can walk exhaustively.

/// Command tokens longer than this are rejected before lookup; no valid
/// command comes close, and it bounds work done on garbage input.
pub const MAX_COMMAND_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    // Lifecycle
    New,
    Delete,
    Copy,
    // Molecule properties
    Testmol,
    Natom,
    Nelec,
    Enuc,
    Coord,
    Zlist,
    // Basis set properties
    Nbasis,
    Func2Center,
    Func2Am,
    // One-electron integrals
    Overlap,
    Kinetic,
    Potential,
    PotentialSep,
    PotentialZxyz,
    PotentialZxyzList,
    Dipole,
    // Two-electron integrals
    TeiIjkl,
    TeiUniqN,
    TeiAllUniq,
    TeiAllFull,
    TeiAllUniqJk,
    // Density contractions
    OccMoToJ,
    OccMoToK,
    OccMoToG,
    // SCF
    Rhf,
    RhfFinalize,
    RhfEnergy,
    RhfCoefficients,
    RhfOrbitalEnergies,
    RhfDensity,
    RhfCoreHamiltonian,
    RhfCoulomb,
    RhfExchange,
    RhfFock,
}

impl Command {
    pub const ALL: [Command; 37] = [
        Command::New,
        Command::Delete,
        Command::Copy,
        Command::Testmol,
        Command::Natom,
        Command::Nelec,
        Command::Enuc,
        Command::Coord,
        Command::Zlist,
        Command::Nbasis,
        Command::Func2Center,
        Command::Func2Am,
        Command::Overlap,
        Command::Kinetic,
        Command::Potential,
        Command::PotentialSep,
        Command::PotentialZxyz,
        Command::PotentialZxyzList,
        Command::Dipole,
        Command::TeiIjkl,
        Command::TeiUniqN,
        Command::TeiAllUniq,
        Command::TeiAllFull,
        Command::TeiAllUniqJk,
        Command::OccMoToJ,
        Command::OccMoToK,
        Command::OccMoToG,
        Command::Rhf,
        Command::RhfFinalize,
        Command::RhfEnergy,
        Command::RhfCoefficients,
        Command::RhfOrbitalEnergies,
        Command::RhfDensity,
        Command::RhfCoreHamiltonian,
        Command::RhfCoulomb,
        Command::RhfExchange,
        Command::RhfFock,
    ];

    /// Resolve a command token. Case-sensitive; over-long tokens never match.
    pub fn lookup(token: &str) -> Option<Command> {
        if token.len() > MAX_COMMAND_LEN {
            return None;
        }
        Command::ALL.iter().copied().find(|c| c.name() == token)
    }

    /// The wire name of this command as the host spells it.
    pub fn name(&self) -> &'static str {
        match self {
            Command::New => "new",
            Command::Delete => "delete",
            Command::Copy => "copy",
            Command::Testmol => "testmol",
            Command::Natom => "natom",
            Command::Nelec => "nelec",
            Command::Enuc => "Enuc",
            Command::Coord => "coord",
            Command::Zlist => "Zlist",
            Command::Nbasis => "nbasis",
            Command::Func2Center => "func2center",
            Command::Func2Am => "func2am",
            Command::Overlap => "overlap",
            Command::Kinetic => "kinetic",
            Command::Potential => "potential",
            Command::PotentialSep => "potential_sep",
            Command::PotentialZxyz => "potential_zxyz",
            Command::PotentialZxyzList => "potential_zxyzlist",
            Command::Dipole => "dipole",
            Command::TeiIjkl => "tei_ijkl",
            Command::TeiUniqN => "tei_uniqN",
            Command::TeiAllUniq => "tei_alluniq",
            Command::TeiAllFull => "tei_allfull",
            Command::TeiAllUniqJk => "tei_alluniqJK",
            Command::OccMoToJ => "OccMO2J",
            Command::OccMoToK => "OccMO2K",
            Command::OccMoToG => "OccMO2G",
            Command::Rhf => "RHF",
            Command::RhfFinalize => "RHF_finalize",
            Command::RhfEnergy => "RHF_EHF",
            Command::RhfCoefficients => "RHF_C",
            Command::RhfOrbitalEnergies => "RHF_EMO",
            Command::RhfDensity => "RHF_D",
            Command::RhfCoreHamiltonian => "RHF_H",
            Command::RhfCoulomb => "RHF_J",
            Command::RhfExchange => "RHF_K",
            Command::RhfFock => "RHF_F",
        }
    }

    /// Every command except construction operates on an existing instance.
    pub fn needs_handle(&self) -> bool {
        !matches!(self, Command::New)
    }

    /// Exact number of positional arguments the command takes.
    /// `delete` is the one lenient exception; the dispatcher warns about
    /// extras instead of failing.
    pub fn input_arity(&self) -> usize {
        match self {
            Command::New => 2,
            Command::PotentialZxyz | Command::TeiIjkl => 4,
            Command::PotentialZxyzList
            | Command::OccMoToJ
            | Command::OccMoToK
            | Command::OccMoToG => 1,
            _ => 0,
        }
    }

    /// Number of host arrays a successful call produces.
    pub fn output_count(&self) -> usize {
        match self {
            Command::Delete | Command::Testmol | Command::RhfFinalize => 0,
            Command::Dipole => 3,
            Command::TeiAllUniqJk => 2,
            _ => 1,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_round_trips_every_command() {
        for cmd in Command::ALL {
            assert_eq!(Command::lookup(cmd.name()), Some(cmd), "name {}", cmd.name());
        }
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        assert_eq!(Command::lookup("RHF"), Some(Command::Rhf));
        assert_eq!(Command::lookup("rhf"), None);
        assert_eq!(Command::lookup("ENUC"), None);
        assert_eq!(Command::lookup("Enuc"), Some(Command::Enuc));
    }

    #[test]
    fn test_lookup_rejects_unknown_and_oversized() {
        assert_eq!(Command::lookup("frobnicate"), None);
        assert_eq!(Command::lookup(""), None);
        let long = "x".repeat(MAX_COMMAND_LEN + 1);
        assert_eq!(Command::lookup(&long), None);
    }

    #[test]
    fn test_names_are_unique() {
        for (i, a) in Command::ALL.iter().enumerate() {
            for b in &Command::ALL[i + 1..] {
                assert_ne!(a.name(), b.name());
            }
        }
    }

    #[test]
    fn test_only_construction_is_handleless() {
        for cmd in Command::ALL {
            assert_eq!(cmd.needs_handle(), cmd != Command::New, "{}", cmd.name());
        }
    }

    #[test]
    fn test_arity_table() {
        assert_eq!(Command::New.input_arity(), 2);
        assert_eq!(Command::PotentialZxyz.input_arity(), 4);
        assert_eq!(Command::TeiIjkl.input_arity(), 4);
        assert_eq!(Command::PotentialZxyzList.input_arity(), 1);
        assert_eq!(Command::OccMoToJ.input_arity(), 1);
        assert_eq!(Command::Overlap.input_arity(), 0);
        assert_eq!(Command::Delete.input_arity(), 0);
    }

    #[test]
    fn test_output_counts() {
        assert_eq!(Command::Dipole.output_count(), 3);
        assert_eq!(Command::TeiAllUniqJk.output_count(), 2);
        assert_eq!(Command::Testmol.output_count(), 0);
        assert_eq!(Command::RhfFinalize.output_count(), 0);
        assert_eq!(Command::Delete.output_count(), 0);
        assert_eq!(Command::Natom.output_count(), 1);
        assert_eq!(Command::New.output_count(), 1);
    }
}
