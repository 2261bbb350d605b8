//! Parsing of wizard prompt input.
use crate::types::Gpu;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardCommand {
    /// Show what is selected for the current step.
    List,
    /// Search the catalog for the current step.
    Search(String),
    /// Toggle on the numbered entry of the last search results.
    Add(Vec<usize>),
    /// Remove the numbered entry of the last `list`.
    Remove(Vec<usize>),
    Workflow(PathBuf),
    Civitai(String),
    Name(String),
    Gpu(Gpu),
    Deps(String),
    Next,
    Back,
    Submit,
    Help,
    Quit,
}

pub const HELP: &str = "\
Commands:
  list                 show the selections of this step
  search <text>        search the catalog (nodes or models)
  add <n> [n ...]      select entries from the last search
  remove <n> [n ...]   drop entries shown by list
  workflow <file>      add the custom nodes used by a workflow file
  civitai <text>       search Civitai for models
  name <machine name>  set the machine name
  gpu <gpu>            any, t4, l4, a10g, a100-40gb, a100-80gb, h100
  deps <commands>      additional dependencies (empty to clear)
  next | back          move between steps
  submit               create the machine
  quit                 leave without creating anything";

fn indices(args: &str) -> Result<Vec<usize>, String> {
    if args.is_empty() {
        return Err("expected one or more entry numbers".to_string());
    }
    args.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|part| !part.is_empty())
        .map(|part| match part.parse::<usize>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(format!("'{}' is not an entry number", part)),
        })
        .collect()
}

fn required(args: &str, what: &str) -> Result<String, String> {
    if args.is_empty() {
        Err(format!("expected {}", what))
    } else {
        Ok(args.to_string())
    }
}

impl WizardCommand {
    pub fn parse(line: &str) -> Result<WizardCommand, String> {
        let line = line.trim();
        let (command, args) = match line.split_once(char::is_whitespace) {
            Some((command, args)) => (command, args.trim()),
            None => (line, ""),
        };

        let parsed = match command.to_ascii_lowercase().as_str() {
            "list" | "ls" => WizardCommand::List,
            "search" | "s" => WizardCommand::Search(args.to_string()),
            "add" | "a" => WizardCommand::Add(indices(args)?),
            "remove" | "rm" => WizardCommand::Remove(indices(args)?),
            "workflow" => WizardCommand::Workflow(PathBuf::from(required(args, "a file path")?)),
            "civitai" => WizardCommand::Civitai(required(args, "a search query")?),
            "name" => WizardCommand::Name(required(args, "a machine name")?),
            "gpu" => WizardCommand::Gpu(args.parse()?),
            "deps" => WizardCommand::Deps(args.to_string()),
            "next" | "n" => WizardCommand::Next,
            "back" | "b" => WizardCommand::Back,
            "submit" => WizardCommand::Submit,
            "help" | "?" => WizardCommand::Help,
            "quit" | "exit" | "q" => WizardCommand::Quit,
            "" => return Err("type 'help' for the list of commands".to_string()),
            other => return Err(format!("unknown command '{}'", other)),
        };
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_with_arguments() {
        assert_eq!(
            WizardCommand::parse("search  impact pack ").unwrap(),
            WizardCommand::Search("impact pack".to_string())
        );
        assert_eq!(
            WizardCommand::parse("add 1, 3 4").unwrap(),
            WizardCommand::Add(vec![1, 3, 4])
        );
        assert_eq!(
            WizardCommand::parse("GPU A100-80GB").unwrap(),
            WizardCommand::Gpu(Gpu::A100Big)
        );
        assert_eq!(WizardCommand::parse("deps").unwrap(), WizardCommand::Deps(String::new()));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(WizardCommand::parse("add 0").is_err());
        assert!(WizardCommand::parse("remove x").is_err());
        assert!(WizardCommand::parse("name").is_err());
        assert!(WizardCommand::parse("gpu v100").unwrap_err().contains("h100"));
        assert!(WizardCommand::parse("deploy").unwrap_err().contains("deploy"));
    }
}
