//! Channel send→receive coupling.
//!
//! For each MakeChan value, transitively follow referrers to collect every
//! send site and receive site reachable from it, then emit a `chan_flow`
//! edge per (send, receive) pair. The follower crosses closures (through
//! closure bindings into free variables), stores and loads, select states,
//! and statically-resolvable calls (into the matching parameter and back
//! out through the return value). Interface dispatch and function-typed
//! variables are not chased.

use rustc_hash::FxHashSet;

use crate::graph::{Edge, EdgeKind, GraphStore};
use crate::ids::PositionIndex;
use crate::progress::Progress;

use super::ir::{Callee, ChanDir, FlowProgram, ValueId, ValueKind};

pub fn extract(
    program: &FlowProgram,
    positions: &PositionIndex,
    store: &mut GraphStore,
    prog: &Progress,
) {
    prog.log("Extracting channel flow edges...");
    let mut chan_flow = 0usize;

    for (func_idx, func) in program.funcs.iter().enumerate() {
        for (value_id, value) in func.values.iter().enumerate() {
            if !matches!(value.kind, ValueKind::MakeChan) {
                continue;
            }

            let mut follower = Follower {
                program,
                positions,
                sends: Vec::new(),
                receives: Vec::new(),
                visited: FxHashSet::default(),
            };
            follower.follow(func_idx, value_id);

            for send in &follower.sends {
                for recv in &follower.receives {
                    if send == recv {
                        continue;
                    }
                    store.add_edge(Edge::plain(send.clone(), recv.clone(), EdgeKind::ChanFlow));
                    chan_flow += 1;
                }
            }
        }
    }

    prog.log(format!("Created {chan_flow} channel flow edges"));
}

struct Follower<'a> {
    program: &'a FlowProgram,
    positions: &'a PositionIndex,
    sends: Vec<String>,
    receives: Vec<String>,
    visited: FxHashSet<(usize, ValueId)>,
}

impl Follower<'_> {
    fn node_at(&self, func_idx: usize, pos: Option<(usize, usize)>) -> Option<String> {
        let (line, col) = pos?;
        let file = &self.program.funcs[func_idx].rel_file;
        self.positions.get(file, line, col).map(str::to_string)
    }

    /// Follow all referrers of a channel-carrying value.
    fn follow(&mut self, func_idx: usize, value: ValueId) {
        if !self.visited.insert((func_idx, value)) {
            return;
        }
        let func = &self.program.funcs[func_idx];

        for &referrer in &func.referrers[value] {
            let data = &func.values[referrer];
            match &data.kind {
                ValueKind::Send => {
                    if data.operands.first() == Some(&value) {
                        if let Some(id) = self.node_at(func_idx, data.pos) {
                            self.sends.push(id);
                        }
                    }
                }
                ValueKind::Recv => {
                    if data.operands.first() == Some(&value) {
                        if let Some(id) = self.node_at(func_idx, data.pos) {
                            self.receives.push(id);
                        }
                    }
                }
                ValueKind::Select { states } => {
                    for state in states {
                        if state.chan != value {
                            continue;
                        }
                        if let Some(id) = self.node_at(func_idx, state.pos) {
                            match state.dir {
                                ChanDir::Send => self.sends.push(id),
                                ChanDir::Recv => self.receives.push(id),
                            }
                        }
                    }
                }
                ValueKind::Load => {
                    // The channel was stored behind an address and is being
                    // loaded back: keep following the loaded value.
                    self.follow(func_idx, referrer);
                }
                ValueKind::Store => {
                    // Stored to an address: follow loads of that address.
                    if data.operands.get(1) == Some(&value) {
                        if let Some(&addr) = data.operands.first() {
                            self.follow(func_idx, addr);
                        }
                    }
                }
                ValueKind::Call { callee } => {
                    self.follow_call_args(func_idx, referrer, callee, value);
                    // The callee may return the channel.
                    self.follow(func_idx, referrer);
                }
                ValueKind::Go { callee } | ValueKind::DeferCall { callee } => {
                    self.follow_call_args(func_idx, referrer, callee, value);
                }
                ValueKind::MakeClosure { func: child } => {
                    // Captured by a closure: bindings align with the
                    // child's free variables.
                    let child_fn = &self.program.funcs[*child];
                    for (i, &binding) in data.operands.iter().enumerate() {
                        if binding == value {
                            if let Some(&fv) = child_fn.free_vars.get(i) {
                                self.follow(*child, fv);
                            }
                        }
                    }
                }
                _ => {
                    // Some other value uses the channel: follow it.
                    self.follow(func_idx, referrer);
                }
            }
        }
    }

    /// Cross-function tracking: when the channel is passed as an argument
    /// to a statically-resolvable callee, continue at the matching
    /// parameter. Dynamic dispatch and function-value calls are skipped.
    fn follow_call_args(
        &mut self,
        func_idx: usize,
        call: ValueId,
        callee: &Callee,
        value: ValueId,
    ) {
        let target = match callee {
            Callee::Known { node_id } => self.program.func_index(node_id),
            Callee::Value(v) => {
                let func = &self.program.funcs[func_idx];
                match &func.values[*v].kind {
                    ValueKind::MakeClosure { func: child } => Some(*child),
                    ValueKind::FuncRef { node_id } => self.program.func_index(node_id),
                    _ => None,
                }
            }
            _ => None,
        };
        let Some(target) = target else { return };

        let func = &self.program.funcs[func_idx];
        let data = &func.values[call];
        // The callee-value operand (if any) precedes the arguments.
        let offset = match callee {
            Callee::Value(_) => 1,
            _ => 0,
        };
        for (i, &arg) in data.operands.iter().enumerate().skip(offset) {
            if arg != value {
                continue;
            }
            let param_index = i - offset;
            let target_fn = &self.program.funcs[target];
            // Closures receive captured channels through free variables,
            // regular calls through parameters.
            if let Some(&param) = target_fn.params.get(param_index) {
                self.follow(target, param);
            }
        }
    }
}
