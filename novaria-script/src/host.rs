//! Sandboxed script plane: one isolated `mlua::Lua` instance per module, each with a memory
//! ceiling, an instruction budget, and a whitelisted set of globals copied into a fresh
//! environment table before user source ever runs.

use mlua::{Function, HookTriggers, Lua, MultiValue, Table, Value, VmState};
use novaria_shared::error::SimError;
use rustc_hash::FxHashMap;
use std::env;
use std::fs;

pub const SCRIPT_API_VERSION: &str = "0.1.0";
pub const SUPPORTED_SCRIPT_CAPABILITIES: [&str; 2] = ["event.receive", "tick.receive"];

const REQUIRED_GLOBALS: [&str; 11] =
	["assert", "error", "ipairs", "next", "pairs", "pcall", "select", "tonumber", "tostring", "type", "xpcall"];
const REQUIRED_LIBRARY_GLOBALS: [&str; 4] = ["math", "string", "table", "coroutine"];
const OPTIONAL_GLOBALS: [&str; 3] = ["novaria", "bit", "utf8"];

const EMBEDDED_BOOTSTRAP_SOURCE: &str = include_str!("novaria_bootstrap.lua");
const BOOTSTRAP_OVERRIDE_ENV_VAR: &str = "NOVARIA_LUA_BOOTSTRAP_FILE";

/// A module source submitted to [`ScriptHost::set_script_modules`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ScriptModuleSource {
	pub module_name: String,
	pub api_version: String,
	pub capabilities: Vec<String>,
	pub source_code: String,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ScriptHostDiagnostics {
	pub loaded_module_count: usize,
	pub total_calls: u64,
	pub total_call_failures: u64,
}

struct ModuleEnv {
	lua: Lua,
	environment: Table,
	capabilities: Vec<String>,
}

/// Owns one isolated Lua VM per loaded script module.
pub struct ScriptHost {
	memory_budget_bytes: usize,
	instruction_budget: u32,
	modules: FxHashMap<String, ModuleEnv>,
	diagnostics: ScriptHostDiagnostics,
}

impl ScriptHost {
	pub fn new(memory_budget_bytes: usize, instruction_budget: u32) -> Self {
		Self {
			memory_budget_bytes,
			instruction_budget,
			modules: FxHashMap::default(),
			diagnostics: ScriptHostDiagnostics::default(),
		}
	}

	pub fn diagnostics_snapshot(&self) -> ScriptHostDiagnostics {
		ScriptHostDiagnostics { loaded_module_count: self.modules.len(), ..self.diagnostics }
	}

	/// Validates the entire set before touching any Lua state; a single invalid source rejects
	/// all of them and leaves the previously loaded modules untouched.
	pub fn set_script_modules(&mut self, sources: Vec<ScriptModuleSource>) -> Result<(), SimError> {
		let mut seen_names = rustc_hash::FxHashSet::default();
		for source in &sources {
			if source.module_name.is_empty() {
				return Err(SimError::ConfigMismatch("module name must not be empty".into()));
			}
			if source.source_code.is_empty() {
				return Err(SimError::ConfigMismatch(format!(
					"module '{}' has empty source",
					source.module_name
				)));
			}
			if !seen_names.insert(source.module_name.clone()) {
				return Err(SimError::ConfigMismatch(format!(
					"duplicate module name '{}'",
					source.module_name
				)));
			}
			if source.api_version != SCRIPT_API_VERSION {
				return Err(SimError::ConfigMismatch(format!(
					"module '{}' targets api version '{}', host provides '{}'",
					source.module_name, source.api_version, SCRIPT_API_VERSION
				)));
			}
			for capability in &source.capabilities {
				if !SUPPORTED_SCRIPT_CAPABILITIES.contains(&capability.as_str()) {
					return Err(SimError::ConfigMismatch(format!(
						"module '{}' requests unsupported capability '{}'",
						source.module_name, capability
					)));
				}
			}
		}

		let bootstrap_source = load_bootstrap_script_source();

		let mut modules = FxHashMap::default();
		for source in sources {
			let capabilities = if source.capabilities.is_empty() {
				SUPPORTED_SCRIPT_CAPABILITIES.iter().map(|c| c.to_string()).collect()
			} else {
				source.capabilities.clone()
			};
			let module_env = self.build_module_environment(&source, &bootstrap_source)?;
			modules.insert(source.module_name, ModuleEnv { capabilities, ..module_env });
		}

		self.modules = modules;
		Ok(())
	}

	fn build_module_environment(
		&self,
		source: &ScriptModuleSource,
		bootstrap_source: &str,
	) -> Result<ModuleEnv, SimError> {
		let lua = Lua::new();
		lua.set_memory_limit(self.memory_budget_bytes).map_err(|error| {
			SimError::ConfigMismatch(format!("module '{}': {error}", source.module_name))
		})?;

		let environment = copy_whitelisted_globals_to_environment(&lua).map_err(|error| {
			SimError::ConfigMismatch(format!("module '{}': {error}", source.module_name))
		})?;

		run_in_environment(&lua, &environment, bootstrap_source, "novaria_bootstrap")
			.map_err(|error| SimError::ConfigMismatch(format!("module '{}' bootstrap: {error}", source.module_name)))?;
		run_in_environment(&lua, &environment, &source.source_code, &source.module_name)
			.map_err(|error| SimError::ConfigMismatch(format!("module '{}': {error}", source.module_name)))?;

		Ok(ModuleEnv { lua, environment, capabilities: Vec::new() })
	}

	/// Calls `module.fn(bytes) -> bytes` under the per-call instruction budget. Any failure
	/// (missing module, missing/non-callable function, budget exceeded, non-string return) is
	/// surfaced as [`SimError::ScriptCallFailure`] and never propagates past this boundary.
	pub fn try_call_module_function(
		&mut self,
		module: &str,
		function: &str,
		bytes: &[u8],
	) -> Result<Vec<u8>, SimError> {
		self.diagnostics.total_calls += 1;
		let result = self.try_call_module_function_inner(module, function, bytes);
		if result.is_err() {
			self.diagnostics.total_call_failures += 1;
		}
		result
	}

	fn try_call_module_function_inner(
		&self,
		module: &str,
		function: &str,
		bytes: &[u8],
	) -> Result<Vec<u8>, SimError> {
		let module_env = self
			.modules
			.get(module)
			.ok_or_else(|| SimError::ScriptCallFailure(format!("module '{module}' not loaded")))?;

		let handler: Function = module_env
			.environment
			.get(function)
			.map_err(|_| SimError::ScriptCallFailure(format!("'{module}.{function}' is not callable")))?;

		let budget = self.instruction_budget;
		let mut instructions_run = 0u32;
		module_env
			.lua
			.set_hook(HookTriggers::every_nth_instruction(64), move |_lua, _debug| {
				instructions_run = instructions_run.saturating_add(64);
				if instructions_run > budget {
					return Err(mlua::Error::RuntimeError("instruction budget exceeded".into()));
				}
				Ok(VmState::Continue)
			});

		let result = handler.call::<_, mlua::String>(bytes);
		module_env.lua.remove_hook();

		let value = result
			.map_err(|error| SimError::ScriptCallFailure(format!("'{module}.{function}': {error}")))?;
		Ok(value.as_bytes().to_vec())
	}

	pub fn dispatch_tick(&mut self, tick_index: u64, fixed_delta_seconds: f64) {
		let module_names: Vec<String> = self.modules.keys().cloned().collect();
		for module_name in module_names {
			let has_handler = self.modules.get(&module_name).is_some_and(|module_env| {
				module_env.capabilities.iter().any(|c| c == "tick.receive")
					&& module_env.environment.get::<_, Function>("on_tick").is_ok()
			});
			if !has_handler {
				continue;
			}
			if let Some(module_env) = self.modules.get(&module_name) {
				if let Ok(handler) = module_env.environment.get::<_, Function>("on_tick") {
					if let Err(error) = handler.call::<_, MultiValue>((tick_index, fixed_delta_seconds)) {
						log::warn!("module '{module_name}' on_tick failed: {error}");
					}
				}
			}
		}
	}

	pub fn dispatch_event(&mut self, event_name: &str, payload: &str) {
		let module_names: Vec<String> = self.modules.keys().cloned().collect();
		for module_name in module_names {
			let Some(module_env) = self.modules.get(&module_name) else { continue };
			if !module_env.capabilities.iter().any(|c| c == "event.receive") {
				continue;
			}
			let Ok(handler) = module_env.environment.get::<_, Function>("on_event") else { continue };
			if let Err(error) = handler.call::<_, MultiValue>((event_name, payload)) {
				log::warn!("module '{module_name}' on_event failed: {error}");
			}
		}
	}
}

fn load_bootstrap_script_source() -> String {
	if let Ok(path) = env::var(BOOTSTRAP_OVERRIDE_ENV_VAR) {
		match fs::read_to_string(&path) {
			Ok(source) => return source,
			Err(error) => {
				log::warn!("NOVARIA_LUA_BOOTSTRAP_FILE set to '{path}' but unreadable ({error}); using embedded bootstrap");
			}
		}
	}
	EMBEDDED_BOOTSTRAP_SOURCE.to_string()
}

fn copy_whitelisted_globals_to_environment(lua: &Lua) -> mlua::Result<Table> {
	let environment = lua.create_table()?;
	let globals = lua.globals();

	for name in REQUIRED_GLOBALS.iter().chain(REQUIRED_LIBRARY_GLOBALS.iter()) {
		let value: Value = globals.get(*name)?;
		environment.set(*name, value)?;
	}
	for name in OPTIONAL_GLOBALS.iter() {
		let value: Value = globals.get(*name).unwrap_or(Value::Nil);
		if !matches!(value, Value::Nil) {
			environment.set(*name, value)?;
		}
	}

	environment.set("_G", environment.clone())?;
	Ok(environment)
}

fn run_in_environment(lua: &Lua, environment: &Table, source: &str, chunk_name: &str) -> mlua::Result<()> {
	lua.load(source).set_name(chunk_name).set_environment(environment.clone()).exec()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn sample_source() -> ScriptModuleSource {
		ScriptModuleSource {
			module_name: "combat".into(),
			api_version: SCRIPT_API_VERSION.into(),
			capabilities: vec!["tick.receive".into()],
			source_code: "function on_tick(tick, dt) end\nfunction echo(bytes) return bytes end".into(),
		}
	}

	#[test]
	fn rejects_mismatched_api_version() {
		let mut host = ScriptHost::new(1024 * 1024, 10_000);
		let mut source = sample_source();
		source.api_version = "9.9.9".into();
		assert!(host.set_script_modules(vec![source]).is_err());
	}

	#[test]
	fn rejects_duplicate_module_names() {
		let mut host = ScriptHost::new(1024 * 1024, 10_000);
		let source = sample_source();
		assert!(host.set_script_modules(vec![source.clone(), source]).is_err());
	}

	#[test]
	fn rejects_unsupported_capability() {
		let mut host = ScriptHost::new(1024 * 1024, 10_000);
		let mut source = sample_source();
		source.capabilities = vec!["world.receive".into()];
		assert!(host.set_script_modules(vec![source]).is_err());
	}

	#[test]
	fn loads_valid_module_and_calls_function() {
		let mut host = ScriptHost::new(1024 * 1024, 10_000);
		host.set_script_modules(vec![sample_source()]).unwrap();
		let result = host.try_call_module_function("combat", "echo", b"hello").unwrap();
		assert_eq!(result, b"hello");
	}

	#[test]
	fn missing_module_fails_without_panicking() {
		let mut host = ScriptHost::new(1024 * 1024, 10_000);
		assert!(host.try_call_module_function("absent", "echo", b"x").is_err());
	}
}
