use crate::introspect::DispMode;
use crate::model::Value;
use crate::session::{RunMode, SimulationProfile};

/// One operator command, as typed at the prompt or read from a script.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Par(Vec<(String, Value)>),
    Init(Vec<(String, Value)>),
    Simu {
        duration: Option<f64>,
        mode: RunMode,
        profile: SimulationProfile,
    },
    Newplot {
        layout: Option<String>,
        title: Option<String>,
    },
    Show,
    Disp {
        filter: String,
        mode: DispMode,
        decimals: Option<usize>,
    },
    Describe {
        name: String,
        decimals: Option<usize>,
    },
    Info,
    Layouts,
    Help,
    Quit,
}

pub const USAGE: &[&str] = &[
    " - par k=v ...          - change of parameters and initial values",
    " - init k=v ...         - change initial values only",
    " - simu [time] [mode] [profile] - simulate and plot",
    " - newplot [layout] [title]     - make a new plot",
    " - show                 - show plot from previous simulation",
    " - disp [name] [short|long] [decimals] - display parameters and initial values",
    " - describe <name> [decimals]   - describe culture, broth, parameters, variables",
    " - info                 - system information",
    " - layouts              - list plot layouts",
    " - quit",
];

/// Parse a command line split on whitespace.
pub fn parse_command(args: &[&str]) -> Result<Command, String> {
    if args.is_empty() {
        return Err("No command specified. Type 'help' for usage.".into());
    }

    match args[0] {
        "par" => parse_assignments(args).map(Command::Par),
        "init" => parse_assignments(args).map(Command::Init),
        "simu" => parse_simu(args),
        "newplot" => parse_newplot(args),
        "show" => Ok(Command::Show),
        "disp" => parse_disp(args),
        "describe" => parse_describe(args),
        "info" => Ok(Command::Info),
        "layouts" => Ok(Command::Layouts),
        "help" => Ok(Command::Help),
        "quit" | "exit" => Ok(Command::Quit),
        _ => Err(format!("Unknown command: '{}'", args[0])),
    }
}

/// `par Y=0.5 Ks=0.2`
fn parse_assignments(args: &[&str]) -> Result<Vec<(String, Value)>, String> {
    if args.len() < 2 {
        return Err(format!("Usage: {} <name>=<value> ...", args[0]));
    }
    args[1..]
        .iter()
        .map(|arg| {
            let (key, value) = arg
                .split_once('=')
                .ok_or_else(|| format!("Expected <name>=<value>, got '{}'", arg))?;
            if key.is_empty() {
                return Err(format!("Missing name in '{}'", arg));
            }
            Ok((key.to_string(), Value::parse_literal(value)))
        })
        .collect()
}

/// `simu [duration] [initial|continued] [standard|fast|data]`, any order.
fn parse_simu(args: &[&str]) -> Result<Command, String> {
    let mut duration = None;
    let mut mode = RunMode::Initial;
    let mut profile = SimulationProfile::default();

    for arg in &args[1..] {
        if let Ok(number) = arg.parse::<f64>() {
            duration = Some(number);
        } else if let Ok(parsed) = arg.parse::<RunMode>() {
            mode = parsed;
        } else if let Ok(parsed) = arg.parse::<SimulationProfile>() {
            profile = parsed;
        } else {
            return Err(format!("Simulation mode not correct: '{}'", arg));
        }
    }
    Ok(Command::Simu {
        duration,
        mode,
        profile,
    })
}

/// `newplot [layout] [title ...]`
fn parse_newplot(args: &[&str]) -> Result<Command, String> {
    let layout = args.get(1).map(|layout| layout.to_string());
    let title = if args.len() > 2 {
        Some(args[2..].join(" "))
    } else {
        None
    };
    Ok(Command::Newplot { layout, title })
}

/// `disp [filter] [short|long] [decimals]`
fn parse_disp(args: &[&str]) -> Result<Command, String> {
    let mut filter = String::new();
    let mut mode = DispMode::default();
    let mut decimals = None;

    for arg in &args[1..] {
        if let Ok(parsed) = arg.parse::<DispMode>() {
            mode = parsed;
        } else if let Ok(number) = arg.parse::<usize>() {
            decimals = Some(number);
        } else if filter.is_empty() {
            filter = arg.to_string();
        } else {
            return Err(format!("Unexpected argument for disp: '{}'", arg));
        }
    }
    Ok(Command::Disp {
        filter,
        mode,
        decimals,
    })
}

/// `describe <name> [decimals]`
fn parse_describe(args: &[&str]) -> Result<Command, String> {
    if args.len() < 2 {
        return Err("Usage: describe <name> [decimals]".into());
    }
    let decimals = args
        .get(2)
        .map(|raw| {
            raw.parse::<usize>()
                .map_err(|_| format!("Invalid decimals: '{}'", raw))
        })
        .transpose()?;
    Ok(Command::Describe {
        name: args[1].to_string(),
        decimals,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Result<Command, String> {
        let args: Vec<&str> = line.split_whitespace().collect();
        parse_command(&args)
    }

    #[test]
    fn test_parse_par() {
        assert_eq!(
            parse("par Y=0.6 VS_start=12").unwrap(),
            Command::Par(vec![
                ("Y".into(), Value::Real(0.6)),
                ("VS_start".into(), Value::Real(12.0)),
            ])
        );
        assert!(parse("par Y").is_err());
        assert!(parse("par").is_err());
    }

    #[test]
    fn test_parse_simu() {
        assert_eq!(
            parse("simu").unwrap(),
            Command::Simu {
                duration: None,
                mode: RunMode::Initial,
                profile: SimulationProfile::Standard,
            }
        );
        assert_eq!(
            parse("simu 2.5 cont fast").unwrap(),
            Command::Simu {
                duration: Some(2.5),
                mode: RunMode::Continued,
                profile: SimulationProfile::Fast,
            }
        );
        assert!(parse("simu 5 sideways").is_err());
    }

    #[test]
    fn test_parse_newplot_and_disp() {
        assert_eq!(
            parse("newplot PhasePlane Batch cultivation").unwrap(),
            Command::Newplot {
                layout: Some("PhasePlane".into()),
                title: Some("Batch cultivation".into()),
            }
        );
        assert_eq!(
            parse("disp start long 2").unwrap(),
            Command::Disp {
                filter: "start".into(),
                mode: DispMode::Long,
                decimals: Some(2),
            }
        );
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(
            parse("plot").unwrap_err(),
            "Unknown command: 'plot'"
        );
    }
}
