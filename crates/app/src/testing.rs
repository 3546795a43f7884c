//! Fixtures shared by the unit tests of this crate.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use shipsafe_domain::audit::AuditRecord;
use shipsafe_domain::command::{Ack, Command};
use shipsafe_domain::device::{Device, DeviceKind};
use shipsafe_domain::error::ShipSafeError;
use shipsafe_domain::id::ZoneId;
use shipsafe_domain::registry::ZoneRegistry;
use shipsafe_domain::subsystem::Subsystem;
use shipsafe_domain::zone::{SuppressionMedium, Zone};

use crate::hub::{CommandDispatcher, CommandEnvelope, CommandReply};
use crate::ports::AuditSink;

pub(crate) struct Ship {
    pub registry: ZoneRegistry,
    pub engine_room: ZoneId,
    pub bridge: ZoneId,
}

impl Ship {
    pub fn device(&self, tag: &str) -> &Device {
        self.registry.device_by_tag(tag).unwrap()
    }
}

/// Engine room with two detector kinds and every actuator, plus a
/// restricted bridge with a camera and a radio.
pub(crate) fn ship() -> Ship {
    let engine_room = Zone::builder()
        .name("engine_room")
        .suppression(SuppressionMedium::Co2)
        .build()
        .unwrap();
    let bridge = Zone::builder()
        .name("bridge")
        .restricted(true)
        .build()
        .unwrap();
    let device = |tag: &str, zone: &Zone, kind: DeviceKind| {
        Device::builder()
            .tag(tag)
            .zone_id(zone.id)
            .kind(kind)
            .build()
            .unwrap()
    };
    let registry = ZoneRegistry::builder()
        .zone(engine_room.clone())
        .zone(bridge.clone())
        .device(device("SMK-ER-001", &engine_room, DeviceKind::SmokeSensor))
        .device(device("HT-ER-001", &engine_room, DeviceKind::HeatSensor))
        .device(device("DMP-ER-001", &engine_room, DeviceKind::Damper))
        .device(device("ESB-ER-001", &engine_room, DeviceKind::StopButton))
        .device(device("SUP-ER-001", &engine_room, DeviceKind::SuppressionRelease))
        .device(device("CAM-ER-001", &engine_room, DeviceKind::Camera))
        .device(device("SPK-ER-001", &engine_room, DeviceKind::Speaker))
        .device(device("CAM-BR-001", &bridge, DeviceKind::Camera))
        .device(device("VHF-BR-001", &bridge, DeviceKind::Radio))
        .device(device("VHF-BR-002", &bridge, DeviceKind::Radio))
        .build()
        .unwrap();
    Ship {
        registry,
        engine_room: engine_room.id,
        bridge: bridge.id,
    }
}

pub(crate) type CommandLog = Arc<Mutex<Vec<Command>>>;

/// A dispatcher whose every subsystem mailbox is served by `respond`.
///
/// Commands are logged in the order the adapters receive them.
pub(crate) fn serving_dispatcher<F>(respond: F) -> (CommandDispatcher, CommandLog)
where
    F: Fn(&Command) -> Option<CommandReply> + Send + Sync + 'static,
{
    let respond = Arc::new(respond);
    let log = CommandLog::default();
    let mut dispatcher = CommandDispatcher::new();
    for subsystem in Subsystem::ALL {
        let mailbox = dispatcher.register(subsystem, 16);
        serve(mailbox, Arc::clone(&log), Arc::clone(&respond));
    }
    (dispatcher, log)
}

/// Acknowledge everything.
pub(crate) fn acking(command: &Command) -> Option<CommandReply> {
    Some(Ok(Ack::now(command.id)))
}

pub(crate) fn serve<F>(
    mut mailbox: mpsc::Receiver<CommandEnvelope>,
    log: CommandLog,
    respond: Arc<F>,
) where
    F: Fn(&Command) -> Option<CommandReply> + Send + Sync + 'static,
{
    tokio::spawn(async move {
        // Envelopes without an answer are kept so the hub sees a timeout
        // rather than a dropped reply.
        let mut unanswered = Vec::new();
        while let Some(envelope) = mailbox.recv().await {
            log.lock().unwrap().push(envelope.command.clone());
            match respond(&envelope.command) {
                Some(reply) => {
                    let _ = envelope.reply.send(reply);
                }
                None => unanswered.push(envelope),
            }
        }
    });
}

/// Audit sink keeping every record in memory.
#[derive(Default)]
pub(crate) struct RecordingSink {
    pub records: Mutex<Vec<AuditRecord>>,
}

impl AuditSink for RecordingSink {
    async fn record(&self, record: &AuditRecord) -> Result<(), ShipSafeError> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}
