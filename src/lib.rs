pub mod archive;
pub mod block;
pub mod emit;
pub mod error;
pub mod field;
pub mod project;
pub mod registry;
pub mod resolve;
pub mod storage;
pub mod validate;
pub mod value;

#[cfg(not(target_arch = "wasm32"))]
pub mod cli;

#[cfg(all(target_arch = "wasm32", feature = "wasm-bindings"))]
pub mod wasm;

use emit::{emit_program, EmittedProgram};
use error::ConvertError;
use project::{Save, TargetRecord};
use registry::BlockRegistry;
use resolve::resolve;
use serde_json::Value;
use storage::Storage;
use tracing::{debug, info};
use validate::entry_point;

#[cfg(not(target_arch = "wasm32"))]
use anyhow::Context;
#[cfg(not(target_arch = "wasm32"))]
use std::io::{Read, Write};

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertOptions {
    pub runtime_header: String,
    pub max_blocks: usize,
    pub max_depth: usize,
    pub emit_declarations: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            runtime_header: "scratch.h".to_string(),
            max_blocks: 100_000,
            max_depth: 256,
            emit_declarations: true,
        }
    }
}

/// The program unit generated for one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversion {
    pub target: String,
    pub program: EmittedProgram,
}

struct Prepared<'a> {
    target: &'a TargetRecord,
    storage: Storage,
    registry: BlockRegistry,
}

fn prepare<'a>(
    target: &'a TargetRecord,
    stage: Option<&TargetRecord>,
    options: &ConvertOptions,
) -> error::Result<Prepared<'a>> {
    let storage = Storage::for_target(target, stage);
    let mut registry = BlockRegistry::build(&target.name, &target.blocks, options.max_blocks)?;
    resolve(&mut registry, &storage)?;
    Ok(Prepared {
        target,
        storage,
        registry,
    })
}

fn finish(prepared: Prepared<'_>, options: &ConvertOptions) -> error::Result<Conversion> {
    let entry = entry_point(&prepared.registry)?;
    let program = emit_program(&prepared.registry, &prepared.storage, entry, options)?;
    info!(
        target_name = %prepared.target.name,
        statements = program.statement_count,
        "converted target"
    );
    Ok(Conversion {
        target: prepared.target.name.clone(),
        program,
    })
}

/// Converts a single target; `stage` contributes its global variables and lists.
pub fn convert_target(
    target: &TargetRecord,
    stage: Option<&TargetRecord>,
    options: &ConvertOptions,
) -> error::Result<Conversion> {
    finish(prepare(target, stage, options)?, options)
}

/// Converts the one target of the save that carries a program.
pub fn convert_save(save: &Save, options: &ConvertOptions) -> error::Result<Conversion> {
    let stage = save.stage();
    let mut prepared = Vec::new();
    for target in &save.targets {
        let target = prepare(target, stage, options)?;
        if target.registry.is_empty() {
            debug!(target_name = %target.target.name, "skipping target without blocks");
            continue;
        }
        prepared.push(target);
    }
    for target in &prepared {
        entry_point(&target.registry)?;
    }
    if prepared.len() > 1 {
        let names = prepared
            .iter()
            .map(|p| p.target.name.as_str())
            .collect::<Vec<_>>()
            .join("', '");
        return Err(ConvertError::TooManyTopLevel {
            target: names,
            count: prepared.len(),
        });
    }
    match prepared.pop() {
        Some(only) => finish(only, options),
        None => Err(ConvertError::NoTopLevel {
            target: "project".to_string(),
        }),
    }
}

/// Converts the target called `name`, ignoring the other targets of the save.
pub fn convert_named_target(
    save: &Save,
    name: &str,
    options: &ConvertOptions,
) -> error::Result<Conversion> {
    let target = save
        .targets
        .iter()
        .find(|t| t.name == name)
        .ok_or_else(|| ConvertError::malformed(format!("Target '{}' not found.", name)))?;
    convert_target(target, save.stage(), options)
}

/// Accepts either a whole project.json or a single serialized target.
pub fn convert_project_json(
    json: &str,
    target: Option<&str>,
    options: &ConvertOptions,
) -> error::Result<Conversion> {
    let root: Value = serde_json::from_str(json)?;
    if root.get("targets").is_some() {
        let save = Save::from_json_value(&root)?;
        return match target {
            Some(name) => convert_named_target(&save, name, options),
            None => convert_save(&save, options),
        };
    }
    let record = TargetRecord::from_json_str(json)?;
    if let Some(name) = target {
        if record.name != name {
            return Err(ConvertError::malformed(format!("Target '{}' not found.", name)));
        }
    }
    convert_target(&record, None, options)
}

/// Converts `.sb3` archive bytes or raw project.json bytes.
pub fn convert_bytes(
    bytes: &[u8],
    target: Option<&str>,
    options: &ConvertOptions,
) -> anyhow::Result<Conversion> {
    let json = if bytes.starts_with(ZIP_MAGIC) {
        archive::read_project_json(bytes)?
    } else {
        String::from_utf8(bytes.to_vec())
            .map_err(|_| ConvertError::malformed("Input is neither a .sb3 archive nor UTF-8 JSON."))?
    };
    Ok(convert_project_json(&json, target, options)?)
}

#[cfg(not(target_arch = "wasm32"))]
pub fn run_cli(args: &cli::Args) -> anyhow::Result<()> {
    let progress = CliProgress::new("Convert", 3, args.quiet);

    progress.emit(1, "Reading input");
    let bytes = match &args.input {
        Some(path) => std::fs::read(path)
            .with_context(|| format!("Failed to read '{}'.", path.display()))?,
        None => {
            let mut bytes = Vec::new();
            std::io::stdin()
                .read_to_end(&mut bytes)
                .context("Failed to read standard input.")?;
            bytes
        }
    };

    progress.emit(2, "Converting blocks");
    let conversion = convert_bytes(&bytes, args.target.as_deref(), &args.options())?;

    progress.emit(3, "Writing output");
    match &args.output {
        Some(path) => std::fs::write(path, conversion.program.source.as_bytes())
            .with_context(|| format!("Failed to write '{}'.", path.display()))?,
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(conversion.program.source.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}

#[cfg(not(target_arch = "wasm32"))]
struct CliProgress {
    prefix: &'static str,
    total: usize,
    quiet: bool,
}

#[cfg(not(target_arch = "wasm32"))]
impl CliProgress {
    fn new(prefix: &'static str, total: usize, quiet: bool) -> Self {
        Self {
            prefix,
            total: total.max(1),
            quiet,
        }
    }

    fn emit(&self, step: usize, label: &str) {
        if self.quiet {
            return;
        }
        let step = step.clamp(1, self.total);
        let bar = render_progress_bar(step, self.total, 14);
        eprintln!(
            "[{}] {}... ({}/{}) {}",
            self.prefix, label, step, self.total, bar
        );
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn render_progress_bar(step: usize, total: usize, width: usize) -> String {
    let width = width.max(1);
    let filled = ((step * width + total / 2) / total).min(width);
    format!("[{}{}]", "=".repeat(filled), "-".repeat(width - filled))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn sprite(name: &str, blocks: Value) -> Value {
        json!({"isStage": false, "name": name, "variables": {}, "lists": {}, "blocks": blocks})
    }

    fn stage(blocks: Value) -> Value {
        json!({
            "isStage": true, "name": "Stage",
            "variables": {"g1": ["speed", 42]}, "lists": {},
            "blocks": blocks
        })
    }

    fn hat() -> Value {
        json!({"hat": {"opcode": "event_whenflagclicked", "topLevel": true}})
    }

    #[test]
    fn progress_bar_fills_proportionally() {
        assert_eq!(render_progress_bar(1, 2, 4), "[==--]");
        assert_eq!(render_progress_bar(3, 3, 3), "[===]");
    }

    #[test]
    fn the_single_program_target_is_converted() {
        let save = json!({"targets": [stage(json!({})), sprite("Robot", hat()), sprite("Idle", json!({}))]});
        let conversion = convert_project_json(&save.to_string(), None, &ConvertOptions::default()).unwrap();
        assert_eq!(conversion.target, "Robot");
        assert!(conversion
            .program
            .source
            .starts_with("// generated by sb3toc from target 'Robot'\n#include \"scratch.h\"\n"));
    }

    #[test]
    fn sprites_see_stage_variables() {
        let blocks = json!({
            "set": {"opcode": "data_setvariableto", "topLevel": true,
                    "inputs": {"VALUE": [1, [10, "1"]]},
                    "fields": {"VARIABLE": ["speed", "g1"]}}
        });
        let save = json!({"targets": [stage(json!({})), sprite("Robot", blocks)]});
        let conversion = convert_project_json(&save.to_string(), None, &ConvertOptions::default()).unwrap();
        let ident = storage::storage_ident(storage::StorageKind::Variable, "speed", "g1");
        assert!(conversion
            .program
            .source
            .contains(&format!("s_value {} = 42.0f;\n", ident)));
        assert!(conversion.program.source.contains(&format!("  {} = (\"1\");\n", ident)));
    }

    #[test]
    fn two_program_targets_are_rejected() {
        let save = json!({"targets": [stage(hat()), sprite("Robot", hat())]});
        let err = convert_project_json(&save.to_string(), None, &ConvertOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TooManyTopLevel);
    }

    #[test]
    fn a_save_without_programs_has_no_top_level() {
        let save = json!({"targets": [stage(json!({})), sprite("Robot", json!({}))]});
        let err = convert_project_json(&save.to_string(), None, &ConvertOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoTopLevel);
    }

    #[test]
    fn every_target_is_built_before_any_is_validated() {
        let hats = json!({
            "h1": {"opcode": "event_whenflagclicked", "topLevel": true},
            "h2": {"opcode": "event_whenflagclicked", "topLevel": true}
        });
        let unknown = json!({"say": {"opcode": "looks_say", "topLevel": true}});
        let save = json!({"targets": [stage(hats), sprite("Robot", unknown)]});
        let err = convert_project_json(&save.to_string(), None, &ConvertOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnimplementedOpcode);
    }

    #[test]
    fn a_target_of_loose_blocks_has_no_top_level() {
        let record = TargetRecord::from_json_str(
            &sprite("Robot", json!({"a": {"opcode": "operator_add", "topLevel": false}})).to_string(),
        )
        .unwrap();
        let err = convert_target(&record, None, &ConvertOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoTopLevel);
    }

    #[test]
    fn named_target_ignores_the_others() {
        let save = json!({"targets": [stage(hat()), sprite("Robot", hat())]});
        let conversion =
            convert_project_json(&save.to_string(), Some("Robot"), &ConvertOptions::default()).unwrap();
        assert_eq!(conversion.target, "Robot");
        let err = convert_project_json(&save.to_string(), Some("Nope"), &ConvertOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
    }

    #[test]
    fn a_bare_target_converts_on_its_own() {
        let target = sprite("Robot", hat());
        let conversion =
            convert_project_json(&target.to_string(), None, &ConvertOptions::default()).unwrap();
        assert_eq!(
            conversion.program.source,
            "// generated by sb3toc from target 'Robot'\n#include \"scratch.h\"\n\n\
             void setup() {\n  // when flag clicked\n}\n\nvoid loop() {\n}\n"
        );
    }

    #[test]
    fn options_shape_the_unit() {
        let options = ConvertOptions {
            runtime_header: "ftduino_scratch.h".to_string(),
            emit_declarations: false,
            ..ConvertOptions::default()
        };
        let save = json!({"targets": [stage(json!({})), sprite("Robot", hat())]});
        let conversion = convert_project_json(&save.to_string(), None, &options).unwrap();
        assert!(conversion.program.source.contains("#include \"ftduino_scratch.h\"\n"));
        assert!(!conversion.program.source.contains("s_value"));
    }

    #[test]
    fn non_utf8_bytes_are_malformed() {
        let err = convert_bytes(&[0xff, 0xfe, 0x00], None, &ConvertOptions::default()).unwrap_err();
        let err = err.downcast_ref::<ConvertError>().unwrap();
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
    }
}
