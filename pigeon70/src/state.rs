//! Position within a transmission.
//!
//! A frame is a VIS tone followed by `height` lines. Each line is a sync tone,
//! a separator tone and one slot per channel of each pixel, left to right.

use crate::{
    config::ProtocolConfig,
    frame::Channel,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum State {
    #[default]
    Vis,
    Line {
        y: usize,
        line_state: LineState,
    },
}

impl State {
    pub fn next(&self, config: &ProtocolConfig) -> Option<Self> {
        let mut state = *self;
        match &mut state {
            Self::Vis => {
                state = State::Line {
                    y: 0,
                    line_state: LineState::Sync,
                };
            }
            Self::Line { y, line_state } => {
                match line_state {
                    LineState::Sync => {
                        *line_state = LineState::Separator;
                    }
                    LineState::Separator => {
                        *line_state = LineState::Scan {
                            x: 0,
                            channel: Channel::default(),
                        };
                    }
                    LineState::Scan { x, channel } => {
                        if let Some(next_channel) = channel.next() {
                            *channel = next_channel;
                        }
                        else {
                            *x += 1;
                            *channel = Channel::default();
                            if *x == config.width {
                                *y += 1;
                                if *y == config.height {
                                    return None;
                                }
                                *line_state = LineState::Sync;
                            }
                        }
                    }
                }
            }
        }

        Some(state)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineState {
    Sync,
    Separator,
    Scan { x: usize, channel: Channel },
}
