//! Pass-through backend directives from `-o` and the options file.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectiveError {
    #[error("directive `{0}` contains whitespace; separate directives with commas, no spaces")]
    EmbeddedWhitespace(String),
}

/// Split one `-o` value into directives.
///
/// Directives are comma separated and may not contain whitespace. Empty
/// pieces (`a,,b` or a trailing comma) are dropped.
pub fn split_directives(value: &str) -> Result<Vec<String>, DirectiveError> {
    let mut directives = Vec::new();
    for piece in value.split(',') {
        if piece.is_empty() {
            continue;
        }
        if piece.chars().any(char::is_whitespace) {
            return Err(DirectiveError::EmbeddedWhitespace(piece.to_string()));
        }
        directives.push(piece.to_string());
    }
    Ok(directives)
}

/// Parse the contents of an options file: one directive per line.
///
/// Blank lines and `#` comments are skipped. A line is kept verbatim
/// (trimmed); it is split into arguments only when the command is built.
pub fn parse_config_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Resource-list flag whose value names several independent resources.
const RESOURCE_LIST_FLAG: &str = "-l";

/// The settings a run of argument words touches.
///
/// `--mem=10G` sets `--mem`; `-p debug` sets `-p`; a resource list such as
/// `-l nodes=1,walltime=2:00:00` sets `-l nodes` and `-l walltime`. A flag
/// and its value may arrive as one word or as two consecutive words, which
/// is how comma-split `-o` values reach here.
pub fn directive_keys<'a, I>(words: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut words = words.into_iter().peekable();
    let mut keys = Vec::new();
    let mut in_resource_list = false;
    while let Some(word) = words.next() {
        if word.starts_with('-') {
            in_resource_list = false;
            if word.contains('=') {
                keys.push(setting_name(word).to_string());
                continue;
            }
            match words.next_if(|next| !next.starts_with('-')) {
                Some(value) if word == RESOURCE_LIST_FLAG => {
                    push_resources(&mut keys, value);
                    in_resource_list = true;
                }
                _ => keys.push(word.to_string()),
            }
        } else if in_resource_list {
            push_resources(&mut keys, word);
        } else {
            keys.push(setting_name(word).to_string());
        }
    }
    keys
}

fn setting_name(word: &str) -> &str {
    word.split_once('=').map_or(word, |(name, _)| name)
}

fn push_resources(keys: &mut Vec<String>, value: &str) {
    for resource in value.split(',').filter(|r| !r.is_empty()) {
        keys.push(format!("{RESOURCE_LIST_FLAG} {}", setting_name(resource)));
    }
}

/// Drop options-file directives that a command-line directive overrides.
///
/// A config line is dropped when any setting it touches is also set on the
/// command line; lines touching only other settings are kept.
pub fn merge_directives(config: Vec<String>, cli: &[String]) -> Vec<String> {
    let overridden = directive_keys(cli.iter().flat_map(|d| d.split_whitespace()));
    config
        .into_iter()
        .filter(|line| {
            !directive_keys(line.split_whitespace())
                .iter()
                .any(|key| overridden.contains(key))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_directives() {
        assert_eq!(
            split_directives("--mem=10G,--time=20:00:00").unwrap(),
            vec!["--mem=10G", "--time=20:00:00"]
        );
        assert_eq!(split_directives("--exclusive").unwrap(), vec!["--exclusive"]);
        assert_eq!(split_directives("a,,b,").unwrap(), vec!["a", "b"]);
        assert!(split_directives("--mem=10G,--time 20:00").is_err());
    }

    #[test]
    fn test_split_matches_repeated_flags() {
        let combined = split_directives("--mem=10G,--time=20:00:00").unwrap();
        let mut separate = split_directives("--mem=10G").unwrap();
        separate.extend(split_directives("--time=20:00:00").unwrap());
        assert_eq!(combined, separate);
    }

    #[test]
    fn test_parse_config_lines() {
        let content = "--mem=4G\n\n# site defaults\n  --time=1:00:00  \r\n--qos=normal";
        assert_eq!(
            parse_config_lines(content),
            vec!["--mem=4G", "--time=1:00:00", "--qos=normal"]
        );
    }

    #[test]
    fn test_directive_keys() {
        assert_eq!(directive_keys(["--mem=10G"]), vec!["--mem"]);
        assert_eq!(directive_keys(["--exclusive"]), vec!["--exclusive"]);
        assert_eq!(directive_keys("-p debug".split_whitespace()), vec!["-p"]);
        assert_eq!(directive_keys(["-p", "debug", "--exclusive"]), vec!["-p", "--exclusive"]);
        assert_eq!(
            directive_keys("-l nodes=1:ppn=4,walltime=02:00:00".split_whitespace()),
            vec!["-l nodes", "-l walltime"]
        );
        assert_eq!(directive_keys(["-l", "mem=8gb"]), vec!["-l mem"]);
        assert_eq!(
            directive_keys(["-l", "nodes=1", "walltime=1:00:00", "-V"]),
            vec!["-l nodes", "-l walltime", "-V"]
        );
    }

    #[test]
    fn test_merge_directives_cli_wins() {
        let config = vec!["--mem=4G".to_string(), "--qos=normal".to_string()];
        let cli = vec!["--mem=10G".to_string()];
        assert_eq!(merge_directives(config, &cli), vec!["--qos=normal"]);
    }

    #[test]
    fn test_merge_keeps_other_pbs_resources() {
        let config = vec![
            "-l walltime=02:00:00".to_string(),
            "-l nodes=1:ppn=1".to_string(),
            "-q batch".to_string(),
        ];
        let cli = split_directives("-l,nodes=1:ppn=4").unwrap();
        assert_eq!(cli, vec!["-l", "nodes=1:ppn=4"]);
        assert_eq!(
            merge_directives(config.clone(), &cli),
            vec!["-l walltime=02:00:00", "-q batch"]
        );

        let cli = split_directives("-q,long").unwrap();
        assert_eq!(
            merge_directives(config, &cli),
            vec!["-l walltime=02:00:00", "-l nodes=1:ppn=1"]
        );
    }
}
