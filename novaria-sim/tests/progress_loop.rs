//! End-to-end progress loop: resource collection, crafting via the sandboxed script plane,
//! and the enemy/boss kill gate, all resolved within a single `update` call.

use novaria_script::ScriptModuleSource;
use novaria_shared::command::{
	GAMEPLAY_ATTACK_BOSS, GAMEPLAY_ATTACK_ENEMY, GAMEPLAY_COLLECT_RESOURCE, GAMEPLAY_CRAFT_RECIPE, RESOURCE_STONE,
	RESOURCE_WOOD,
};
use novaria_shared::wire::PlayerCommand;
use novaria_shared::SimConfig;
use novaria_sim::{AuthorityMode, Kernel};

const GAMEPLAY_RULES_SOURCE: &str = r#"
local function write_varuint(out, value)
	while true do
		local chunk = value & 0x7f
		value = value >> 7
		if value ~= 0 then
			chunk = chunk | 0x80
		end
		table.insert(out, string.char(chunk))
		if value == 0 then
			break
		end
	end
end

local function write_varint(out, value)
	local zigzag
	if value >= 0 then
		zigzag = value * 2
	else
		zigzag = (-value * 2) - 1
	end
	write_varuint(out, zigzag)
end

local function read_u8(bytes, pos)
	return string.byte(bytes, pos), pos + 1
end

local function read_varuint(bytes, pos)
	local result = 0
	local shift = 0
	while true do
		local byte = string.byte(bytes, pos)
		pos = pos + 1
		result = result | ((byte & 0x7f) << shift)
		if byte & 0x80 == 0 then
			break
		end
		shift = shift + 7
	end
	return result, pos
end

local function read_varint(bytes, pos)
	local raw
	raw, pos = read_varuint(bytes, pos)
	local value
	if raw % 2 == 0 then
		value = raw // 2
	else
		value = -((raw + 1) // 2)
	end
	return value, pos
end

-- Recipe 0 builds a workbench for 10 wood, recipe 1 a wood sword for 7 wood.
function craft_recipe(bytes)
	local pos = 3 -- past (version, command)
	local _player_id
	_player_id, pos = read_varuint(bytes, pos)
	local _player_tile_x
	_player_tile_x, pos = read_varint(bytes, pos)
	local _player_tile_y
	_player_tile_y, pos = read_varint(bytes, pos)
	local recipe_index
	recipe_index, pos = read_u8(bytes, pos)

	local wood_delta, workbench_delta, wood_sword_delta, crafted_kind, milestone_flags
	if recipe_index == 0 then
		wood_delta, workbench_delta, wood_sword_delta, crafted_kind, milestone_flags = -10, 1, 0, 1, 1
	else
		wood_delta, workbench_delta, wood_sword_delta, crafted_kind, milestone_flags = -7, 0, 1, 0, 2
	end

	local out = {}
	table.insert(out, string.char(1)) -- simrpc version
	table.insert(out, string.char(2)) -- GameplayCraftRecipe
	table.insert(out, string.char(1)) -- CraftRecipeResult::Craft
	write_varint(out, 0) -- dirt_delta
	write_varint(out, 0) -- stone_delta
	write_varint(out, wood_delta)
	write_varint(out, 0) -- coal_delta
	write_varint(out, 0) -- torch_delta
	write_varint(out, workbench_delta)
	write_varint(out, wood_sword_delta)
	table.insert(out, string.char(crafted_kind))
	table.insert(out, string.char(milestone_flags))
	return table.concat(out)
end

function action_primary(bytes)
	-- Always rejects; this fixture only exercises the crafting path.
	return string.char(1) .. string.char(1) .. string.char(0) .. string.char(0) .. string.char(0)
end
"#;

fn test_config() -> SimConfig {
	SimConfig { udp_bind: "127.0.0.1:0".parse().unwrap(), udp_peer: None, ..SimConfig::default() }
}

fn craft_recipe_command(player_id: u32, recipe_index: u8) -> PlayerCommand {
	let request = novaria_script::simrpc::CraftRecipeRequest {
		player_id,
		player_tile_x: 0,
		player_tile_y: 0,
		recipe_index,
		workbench_reachable: true,
		dirt_count: 0,
		stone_count: 0,
		wood_count: 20,
		coal_count: 0,
		torch_count: 0,
		workbench_count: 0,
		wood_sword_count: 0,
	};
	PlayerCommand {
		player_id,
		command_id: GAMEPLAY_CRAFT_RECIPE,
		payload: novaria_script::simrpc::encode_craft_recipe_request(&request),
	}
}

fn collect_resource_command(player_id: u32, resource_id: u32, amount: u32) -> PlayerCommand {
	let mut payload = Vec::new();
	novaria_shared::wire::varint::write_varuint(&mut payload, resource_id as u64);
	novaria_shared::wire::varint::write_varuint(&mut payload, amount as u64);
	PlayerCommand { player_id, command_id: GAMEPLAY_COLLECT_RESOURCE, payload }
}

#[test]
fn progress_loop_completes_and_defeats_boss_in_one_tick() {
	let mut kernel = Kernel::init(test_config(), AuthorityMode::Authority).unwrap();
	kernel
		.set_script_modules(vec![ScriptModuleSource {
			module_name: "gameplay_rules".into(),
			api_version: novaria_script::host::SCRIPT_API_VERSION.into(),
			capabilities: Vec::new(),
			source_code: GAMEPLAY_RULES_SOURCE.into(),
		}])
		.unwrap();

	kernel.submit_local_command(collect_resource_command(1, RESOURCE_WOOD, 20));
	kernel.submit_local_command(collect_resource_command(1, RESOURCE_STONE, 20));
	kernel.submit_local_command(craft_recipe_command(1, 0)); // workbench
	kernel.submit_local_command(craft_recipe_command(1, 1)); // wood sword
	for _ in 0..3 {
		kernel.submit_local_command(PlayerCommand { player_id: 1, command_id: GAMEPLAY_ATTACK_ENEMY, payload: Vec::new() });
	}
	for _ in 0..6 {
		kernel.submit_local_command(PlayerCommand { player_id: 1, command_id: GAMEPLAY_ATTACK_BOSS, payload: Vec::new() });
	}

	kernel.update(1.0 / 60.0);

	let state = kernel.ruleset().state();
	assert!(state.workbench_built);
	assert!(state.sword_crafted);
	assert!(state.boss_defeated);
	assert!(state.playable_loop_complete);
	assert_eq!(kernel.diagnostics().dropped_malformed_command_count, 0);
}
