//! Command: generate shell completions.
use clap::CommandFactory;

use crate::cli::{Cli, CompletionsOpts};

/// Write completions for the requested shell to `out`.
pub fn write(opts: &CompletionsOpts, out: &mut dyn std::io::Write) {
    let mut command = Cli::command();
    let name = command.get_name().to_string();
    clap_complete::generate(opts.shell, &mut command, name, out);
}

/// Print completions for the requested shell to stdout.
pub fn run(opts: &CompletionsOpts) {
    write(opts, &mut std::io::stdout());
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn bash_completions_mention_subcommands() {
        let mut buf = Vec::new();
        write(
            &CompletionsOpts {
                shell: clap_complete::Shell::Bash,
            },
            &mut buf,
        );
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("opencode-sync"));
        assert!(text.contains("resolve"));
    }
}
