//! UDP peer transport: a connection state machine, handshake, heartbeats, and the envelope
//! framing of [`novaria_shared::wire`] carried over `std::net::UdpSocket` in non-blocking mode.

use novaria_shared::tick::INVALID_TICK;
use novaria_shared::wire::{
	chunk_codec, control, encode_envelope, player_command, try_decode_envelope, ChunkSnapshot, ControlType,
	MessageKind, PlayerCommand,
};
use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};

pub const MAX_PENDING_COMMANDS: usize = 1024;
pub const MAX_PENDING_REMOTE_CHUNK_PAYLOADS: usize = 1024;
pub const HEARTBEAT_TIMEOUT_TICKS: u64 = 180;
pub const CONNECT_PROBE_INTERVAL_TICKS: u64 = 30;
pub const MAX_CONNECT_PROBE_INTERVAL_TICKS: u64 = 240;
pub const CONNECT_TIMEOUT_TICKS: u64 = 600;
pub const HEARTBEAT_SEND_INTERVAL_TICKS: u64 = 30;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SessionState {
	Disconnected,
	Connecting,
	Connected,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TransportDiagnostics {
	pub session_state: Option<&'static str>,
	pub last_transition_reason: String,
	pub last_heartbeat_tick: u64,
	pub session_transition_count: u64,
	pub connected_transition_count: u64,
	pub connect_request_count: u64,
	pub connect_probe_send_count: u64,
	pub connect_probe_send_failure_count: u64,
	pub timeout_disconnect_count: u64,
	pub manual_disconnect_count: u64,
	pub ignored_heartbeat_count: u64,
	pub ignored_unexpected_sender_count: u64,
	pub dropped_command_count: u64,
	pub unsent_command_count: u64,
	pub dropped_snapshot_count: u64,
	pub unsent_snapshot_count: u64,
}

pub struct UdpPeerTransport {
	socket: UdpSocket,
	local_addr: SocketAddr,
	peer: Option<SocketAddr>,
	pin_peer: bool,

	state: SessionState,
	start_tick: u64,
	next_probe_tick: u64,
	probe_interval: u64,
	handshake_ack_received: bool,
	last_heartbeat_tick: u64,
	last_sent_heartbeat_tick: u64,

	remote_commands: Vec<PlayerCommand>,
	remote_chunk_payloads: Vec<ChunkSnapshot>,

	diagnostics: TransportDiagnostics,
}

impl UdpPeerTransport {
	pub fn bind(bind_addr: SocketAddr, peer: Option<SocketAddr>) -> std::io::Result<Self> {
		let socket = UdpSocket::bind(bind_addr)?;
		socket.set_nonblocking(true)?;
		let local_addr = socket.local_addr()?;
		let pin_peer = peer.is_some();

		Ok(Self {
			socket,
			local_addr,
			peer,
			pin_peer,
			state: SessionState::Disconnected,
			start_tick: INVALID_TICK,
			next_probe_tick: INVALID_TICK,
			probe_interval: CONNECT_PROBE_INTERVAL_TICKS,
			handshake_ack_received: false,
			last_heartbeat_tick: INVALID_TICK,
			last_sent_heartbeat_tick: INVALID_TICK,
			remote_commands: Vec::new(),
			remote_chunk_payloads: Vec::new(),
			diagnostics: TransportDiagnostics::default(),
		})
	}

	pub fn session_state(&self) -> SessionState {
		self.state
	}

	pub fn diagnostics_snapshot(&self) -> TransportDiagnostics {
		TransportDiagnostics {
			session_state: Some(match self.state {
				SessionState::Disconnected => "disconnected",
				SessionState::Connecting => "connecting",
				SessionState::Connected => "connected",
			}),
			..self.diagnostics.clone()
		}
	}

	pub fn request_connect(&mut self, tick_index: u64) {
		if self.state != SessionState::Disconnected {
			return;
		}
		self.diagnostics.connect_request_count += 1;
		self.transition(SessionState::Connecting, tick_index, "request_connect");
		self.start_tick = tick_index;
		self.next_probe_tick = INVALID_TICK;
		self.probe_interval = CONNECT_PROBE_INTERVAL_TICKS;
		self.handshake_ack_received = false;
	}

	pub fn request_disconnect(&mut self, tick_index: u64) {
		if self.state == SessionState::Disconnected {
			return;
		}
		self.diagnostics.manual_disconnect_count += 1;
		self.reset_to_disconnected(tick_index, "manual_disconnect");
	}

	pub fn shutdown(&mut self) {
		self.remote_commands.clear();
		self.remote_chunk_payloads.clear();
		self.state = SessionState::Disconnected;
	}

	pub fn tick(&mut self, tick_index: u64) {
		self.drain_inbound(tick_index);

		match self.state {
			SessionState::Disconnected => {}
			SessionState::Connecting => self.tick_connecting(tick_index),
			SessionState::Connected => self.tick_connected(tick_index),
		}
	}

	fn tick_connecting(&mut self, tick_index: u64) {
		if self.next_probe_tick == INVALID_TICK {
			self.send_syn();
			self.next_probe_tick = tick_index + self.probe_interval;
		} else if tick_index >= self.next_probe_tick {
			self.send_syn();
			self.next_probe_tick = tick_index + self.probe_interval;
			self.probe_interval = (self.probe_interval * 2).min(MAX_CONNECT_PROBE_INTERVAL_TICKS);
		}

		if self.handshake_ack_received {
			self.probe_interval = CONNECT_PROBE_INTERVAL_TICKS;
			self.last_heartbeat_tick = tick_index;
			self.last_sent_heartbeat_tick = tick_index;
			self.transition(SessionState::Connected, tick_index, "handshake_complete");
			return;
		}

		if tick_index.saturating_sub(self.start_tick) > CONNECT_TIMEOUT_TICKS {
			self.diagnostics.timeout_disconnect_count += 1;
			self.reset_to_disconnected(tick_index, "connect_timeout");
		}
	}

	fn tick_connected(&mut self, tick_index: u64) {
		if tick_index.saturating_sub(self.last_heartbeat_tick) > HEARTBEAT_TIMEOUT_TICKS {
			self.diagnostics.timeout_disconnect_count += 1;
			self.reset_to_disconnected(tick_index, "heartbeat_timeout");
			return;
		}

		if tick_index.saturating_sub(self.last_sent_heartbeat_tick) >= HEARTBEAT_SEND_INTERVAL_TICKS {
			self.send_control(ControlType::Heartbeat);
			self.last_sent_heartbeat_tick = tick_index;
		}
	}

	fn transition(&mut self, new_state: SessionState, _tick_index: u64, reason: &str) {
		self.state = new_state;
		self.diagnostics.session_transition_count += 1;
		self.diagnostics.last_transition_reason = reason.to_string();
		if new_state == SessionState::Connected {
			self.diagnostics.connected_transition_count += 1;
		}
	}

	fn reset_to_disconnected(&mut self, tick_index: u64, reason: &str) {
		self.remote_commands.clear();
		self.remote_chunk_payloads.clear();
		self.transition(SessionState::Disconnected, tick_index, reason);
	}

	fn is_self_endpoint(&self) -> bool {
		matches!(self.peer, Some(peer) if peer == self.local_addr)
	}

	fn send_syn(&mut self) {
		self.diagnostics.connect_probe_send_count += 1;
		if self.send_control(ControlType::Syn).is_err() {
			self.diagnostics.connect_probe_send_failure_count += 1;
		}
	}

	fn send_control(&self, control_type: ControlType) -> std::io::Result<()> {
		let Some(peer) = self.peer else { return Ok(()) };
		let payload = control::encode_control_payload(control_type);
		let datagram = encode_envelope(MessageKind::Control, &payload);
		self.socket.send_to(&datagram, peer).map(|_| ())
	}

	pub fn submit_local_command(&mut self, command: PlayerCommand) {
		self.remote_commands.push(command.clone());

		if self.state != SessionState::Connected {
			self.diagnostics.unsent_command_count += 1;
			return;
		}
		if self.is_self_endpoint() {
			return;
		}

		let Some(peer) = self.peer else {
			self.diagnostics.unsent_command_count += 1;
			return;
		};
		let payload = player_command::encode_player_command(&command);
		let datagram = encode_envelope(MessageKind::Command, &payload);
		if self.socket.send_to(&datagram, peer).is_err() {
			self.diagnostics.unsent_command_count += 1;
		}
	}

	pub fn publish_world_snapshot(&mut self, _tick_index: u64, chunk_snapshots: &[ChunkSnapshot]) {
		if chunk_snapshots.is_empty() {
			return;
		}

		if self.is_self_endpoint() {
			for snapshot in chunk_snapshots {
				if self.remote_chunk_payloads.len() >= MAX_PENDING_REMOTE_CHUNK_PAYLOADS {
					self.diagnostics.dropped_snapshot_count += 1;
					continue;
				}
				self.remote_chunk_payloads.push(snapshot.clone());
			}
			return;
		}

		if self.state != SessionState::Connected {
			self.diagnostics.unsent_snapshot_count += 1;
			return;
		}
		let Some(peer) = self.peer else {
			self.diagnostics.unsent_snapshot_count += 1;
			return;
		};

		let payload = chunk_codec::encode_chunk_snapshot_batch(chunk_snapshots);
		let datagram = encode_envelope(MessageKind::ChunkSnapshotBatch, &payload);
		if self.socket.send_to(&datagram, peer).is_err() {
			self.diagnostics.unsent_snapshot_count += 1;
		}
	}

	pub fn consume_remote_commands(&mut self) -> Vec<PlayerCommand> {
		std::mem::take(&mut self.remote_commands)
	}

	pub fn consume_remote_chunk_payloads(&mut self) -> Vec<ChunkSnapshot> {
		std::mem::take(&mut self.remote_chunk_payloads)
	}

	fn drain_inbound(&mut self, tick_index: u64) {
		let mut buffer = [0u8; 65536];
		loop {
			let (len, sender) = match self.socket.recv_from(&mut buffer) {
				Ok(result) => result,
				Err(error) if error.kind() == ErrorKind::WouldBlock || error.kind() == ErrorKind::Interrupted => break,
				Err(_) => break,
			};

			let is_expected_sender = match self.peer {
				Some(peer) => peer == sender,
				None => false,
			};

			let envelope = match try_decode_envelope(&buffer[..len]) {
				Ok(envelope) => envelope,
				Err(_) => continue,
			};

			if !is_expected_sender {
				let can_adopt = !self.pin_peer
					&& self.state != SessionState::Connected
					&& envelope.kind == MessageKind::Control
					&& control::decode_control_payload(envelope.payload) == Ok(ControlType::Syn);

				if !can_adopt {
					self.diagnostics.ignored_unexpected_sender_count += 1;
					continue;
				}
				self.peer = Some(sender);
				self.transition(SessionState::Connecting, tick_index, "adopted_peer");
				self.start_tick = tick_index;
			}

			match envelope.kind {
				MessageKind::Control => self.route_control(tick_index, envelope.payload),
				MessageKind::Command => self.route_command(envelope.payload),
				MessageKind::ChunkSnapshot => self.route_chunk_snapshot(envelope.payload),
				MessageKind::ChunkSnapshotBatch => self.route_chunk_snapshot_batch(envelope.payload),
			}
		}
	}

	fn route_control(&mut self, tick_index: u64, payload: &[u8]) {
		let Ok(control_type) = control::decode_control_payload(payload) else { return };
		match control_type {
			ControlType::Syn => {
				let _ = self.send_control(ControlType::Ack);
				if self.state == SessionState::Disconnected {
					self.transition(SessionState::Connecting, tick_index, "received_syn");
					self.start_tick = tick_index;
					self.next_probe_tick = tick_index + self.probe_interval;
				}
			}
			ControlType::Ack => self.handshake_ack_received = true,
			ControlType::Heartbeat => {
				self.last_heartbeat_tick = tick_index;
				if self.state == SessionState::Connecting {
					self.handshake_ack_received = true;
				} else if self.state != SessionState::Connected {
					self.diagnostics.ignored_heartbeat_count += 1;
				}
			}
		}
	}

	fn route_command(&mut self, payload: &[u8]) {
		let Ok(command) = player_command::decode_player_command(payload) else { return };
		if self.remote_commands.len() >= MAX_PENDING_COMMANDS {
			self.diagnostics.dropped_command_count += 1;
			return;
		}
		self.remote_commands.push(command);
	}

	fn route_chunk_snapshot(&mut self, payload: &[u8]) {
		let mut cursor = 0;
		let Ok(snapshot) = chunk_codec::decode_chunk_snapshot(payload, &mut cursor) else { return };
		if self.remote_chunk_payloads.len() >= MAX_PENDING_REMOTE_CHUNK_PAYLOADS {
			self.diagnostics.dropped_snapshot_count += 1;
			return;
		}
		self.remote_chunk_payloads.push(snapshot);
	}

	fn route_chunk_snapshot_batch(&mut self, payload: &[u8]) {
		let Ok(snapshots) = chunk_codec::try_split_chunk_snapshot_batch(payload) else { return };
		for snapshot in snapshots {
			if self.remote_chunk_payloads.len() >= MAX_PENDING_REMOTE_CHUNK_PAYLOADS {
				self.diagnostics.dropped_snapshot_count += 1;
				continue;
			}
			self.remote_chunk_payloads.push(snapshot);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use novaria_shared::world::ChunkCoord;

	fn loopback_pair() -> (UdpPeerTransport, UdpPeerTransport) {
		let a = UdpPeerTransport::bind("127.0.0.1:0".parse().unwrap(), None).unwrap();
		let addr_a = a.local_addr;
		let mut b = UdpPeerTransport::bind("127.0.0.1:0".parse().unwrap(), Some(addr_a)).unwrap();
		let addr_b = b.local_addr;
		let mut a = a;
		a.peer = Some(addr_b);
		a.pin_peer = true;
		(a, b)
	}

	#[test]
	fn handshake_reaches_connected_on_both_sides() {
		let (mut a, mut b) = loopback_pair();
		b.request_connect(0);

		for tick in 0..50 {
			b.tick(tick);
			std::thread::yield_now();
			a.tick(tick);
		}

		assert_eq!(a.session_state(), SessionState::Connected);
		assert_eq!(b.session_state(), SessionState::Connected);
	}

	#[test]
	fn heartbeat_timeout_disconnects() {
		let mut transport = UdpPeerTransport::bind("127.0.0.1:0".parse().unwrap(), None).unwrap();
		transport.peer = Some("127.0.0.1:1".parse().unwrap());
		transport.pin_peer = true;
		transport.state = SessionState::Connected;
		transport.last_heartbeat_tick = 0;

		transport.tick(HEARTBEAT_TIMEOUT_TICKS + 1);
		assert_eq!(transport.session_state(), SessionState::Disconnected);
		assert_eq!(transport.diagnostics_snapshot().timeout_disconnect_count, 1);
	}

	#[test]
	fn self_endpoint_snapshot_routes_to_local_queue() {
		let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
		let mut transport = UdpPeerTransport::bind(addr, None).unwrap();
		let local_addr = transport.local_addr;
		transport.peer = Some(local_addr);

		let snapshot = ChunkSnapshot { coord: ChunkCoord { cx: 0, cy: 0 }, tiles: vec![0; 1024] };
		transport.publish_world_snapshot(0, &[snapshot.clone()]);

		let received = transport.consume_remote_chunk_payloads();
		assert_eq!(received, vec![snapshot]);
	}
}
