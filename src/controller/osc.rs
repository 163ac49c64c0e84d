// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::{
    error::Error,
    io,
    net::{Ipv4Addr, SocketAddr, SocketAddrV4},
    sync::Arc,
};

use rosc::{
    address::{Matcher, OscAddress},
    OscMessage, OscPacket, OscType,
};
use tokio::{net::UdpSocket, sync::mpsc::Sender, task::JoinHandle};
use tracing::{debug, error, info, span, Instrument, Level};

use super::Event;
use crate::config;

/// A controller that drives the wheel and speed fader over OSC.
pub struct Driver {
    /// The socket address to host the OSC server on.
    addr: SocketAddr,
    /// OSC events.
    osc_events: Arc<OscEvents>,
}

pub(super) struct OscEvents {
    /// The OSC address whose first argument grabs (> 0) or releases the wheel.
    grab: Matcher,
    /// The OSC address carrying the absolute wheel position.
    position: Matcher,
    /// The OSC address carrying the fader position.
    fader: Matcher,
}

impl OscEvents {
    fn new(config: &config::Osc) -> Result<OscEvents, Box<dyn Error>> {
        Ok(OscEvents {
            grab: Matcher::new(config.grab_address().as_str())?,
            position: Matcher::new(config.position_address().as_str())?,
            fader: Matcher::new(config.fader_address().as_str())?,
        })
    }
}

impl Driver {
    pub fn new(config: &config::Osc) -> Result<Arc<Self>, Box<dyn Error>> {
        Ok(Arc::new(Driver {
            addr: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, config.port())),
            osc_events: Arc::new(OscEvents::new(config)?),
        }))
    }
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
        let addr = self.addr;
        let osc_events = self.osc_events.clone();

        tokio::spawn(
            async move {
                let socket = UdpSocket::bind(addr).await?;
                info!(addr = %addr, "OSC driver started.");

                let mut buf = [0u8; rosc::decoder::MTU];
                loop {
                    let size = match socket.recv_from(&mut buf).await {
                        Ok((size, _)) => size,
                        Err(e) => {
                            error!(err = e.to_string(), "Error receiving UDP.");
                            continue;
                        }
                    };
                    let packet = match rosc::decoder::decode_udp(&buf[..size]) {
                        Ok((_, packet)) => packet,
                        Err(e) => {
                            error!(err = e.to_string(), "Error decoding OSC message");
                            continue;
                        }
                    };

                    let mut events = Vec::new();
                    handle_packet(&osc_events, &packet, &mut events);
                    for event in events {
                        if events_tx.send(event).await.is_err() {
                            info!("Controller closed, stopping OSC driver.");
                            return Ok(());
                        }
                    }
                }
            }
            .instrument(span!(Level::INFO, "OSC Driver")),
        )
    }
}

/// Collects the events carried by a packet, recursing into bundles.
pub(super) fn handle_packet(osc_events: &OscEvents, packet: &OscPacket, events: &mut Vec<Event>) {
    match packet {
        OscPacket::Message(msg) => {
            if let Some(event) = handle_message(osc_events, msg) {
                events.push(event);
            }
        }
        OscPacket::Bundle(bundle) => {
            for packet in &bundle.content {
                handle_packet(osc_events, packet, events);
            }
        }
    }
}

/// Maps a single message to an event. Unknown addresses and messages without
/// a numeric first argument are ignored.
fn handle_message(osc_events: &OscEvents, msg: &OscMessage) -> Option<Event> {
    let address = match OscAddress::new(msg.addr.clone()) {
        Ok(address) => address,
        Err(e) => {
            debug!(addr = msg.addr, err = e.to_string(), "Ignoring bad OSC address");
            return None;
        }
    };
    let value = msg.args.first().and_then(as_f32);

    if osc_events.grab.match_address(&address) {
        value.map(|v| Event::WheelGrab(v > 0.0))
    } else if osc_events.position.match_address(&address) {
        value.map(Event::WheelPosition)
    } else if osc_events.fader.match_address(&address) {
        value.map(Event::Fader)
    } else {
        None
    }
}

fn as_f32(arg: &OscType) -> Option<f32> {
    match arg {
        OscType::Float(v) => Some(*v),
        OscType::Double(v) => Some(*v as f32),
        OscType::Int(v) => Some(*v as f32),
        OscType::Long(v) => Some(*v as f32),
        OscType::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use ::config::{Config, File, FileFormat};
    use rosc::{OscBundle, OscTime};
    use tokio::sync::mpsc;

    use super::*;
    use crate::controller::Driver as _;

    fn osc_config(yaml: &str) -> crate::config::Osc {
        Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    fn message(addr: &str, args: Vec<OscType>) -> OscPacket {
        OscPacket::Message(OscMessage {
            addr: addr.to_string(),
            args,
        })
    }

    fn events_for(packet: &OscPacket) -> Vec<Event> {
        let osc_events = OscEvents::new(&osc_config("port: 0")).unwrap();
        let mut events = Vec::new();
        handle_packet(&osc_events, packet, &mut events);
        events
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            events_for(&message("/wheel/z", vec![OscType::Float(1.0)])),
            vec![Event::WheelGrab(true)]
        );
        assert_eq!(
            events_for(&message("/wheel/z", vec![OscType::Int(0)])),
            vec![Event::WheelGrab(false)]
        );
        assert_eq!(
            events_for(&message("/wheel/x", vec![OscType::Double(0.25)])),
            vec![Event::WheelPosition(0.25)]
        );
        assert_eq!(
            events_for(&message("/Fader/x", vec![OscType::Float(0.5)])),
            vec![Event::Fader(0.5)]
        );
        assert!(events_for(&message("/Fader/x", vec![])).is_empty());
        assert!(events_for(&message("/Fader/x", vec![OscType::String("a".into())])).is_empty());
        assert!(events_for(&message("/other", vec![OscType::Float(1.0)])).is_empty());
    }

    #[test]
    fn test_bundles_are_recursed() {
        let packet = OscPacket::Bundle(OscBundle {
            timetag: OscTime::from((0, 1)),
            content: vec![
                message("/wheel/z", vec![OscType::Float(1.0)]),
                OscPacket::Bundle(OscBundle {
                    timetag: OscTime::from((0, 1)),
                    content: vec![message("/wheel/x", vec![OscType::Float(0.5)])],
                }),
            ],
        });
        assert_eq!(
            events_for(&packet),
            vec![Event::WheelGrab(true), Event::WheelPosition(0.5)]
        );
    }

    #[test]
    fn test_custom_addresses() {
        let osc_events =
            OscEvents::new(&osc_config("fader_address: /speed\nposition_address: /jog")).unwrap();
        let mut events = Vec::new();
        handle_packet(&osc_events, &message("/speed", vec![OscType::Float(0.1)]), &mut events);
        handle_packet(&osc_events, &message("/Fader/x", vec![OscType::Float(0.1)]), &mut events);
        handle_packet(&osc_events, &message("/jog", vec![OscType::Float(0.2)]), &mut events);
        assert_eq!(events, vec![Event::Fader(0.1), Event::WheelPosition(0.2)]);
    }

    #[tokio::test]
    async fn test_osc_over_udp() -> Result<(), Box<dyn Error>> {
        // Find a free port, then hand it to the driver.
        let port = std::net::UdpSocket::bind("127.0.0.1:0")?.local_addr()?.port();
        let driver = Driver::new(&osc_config(&format!("port: {}", port)))?;
        let (events_tx, mut events_rx) = mpsc::channel(10);
        let handle = driver.monitor_events(events_tx);

        let client = UdpSocket::bind("127.0.0.1:0").await?;
        let buf = rosc::encoder::encode(&message("/Fader/x", vec![OscType::Float(0.75)]))?;
        let target = format!("127.0.0.1:{}", port);

        // The driver may not have bound yet, so keep sending until it answers.
        let event = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                client.send_to(&buf, &target).await?;
                if let Ok(Some(event)) =
                    tokio::time::timeout(Duration::from_millis(50), events_rx.recv()).await
                {
                    return Ok::<Event, io::Error>(event);
                }
            }
        })
        .await??;
        assert_eq!(event, Event::Fader(0.75));

        handle.abort();
        Ok(())
    }
}
