//! Line-oriented driver over [`CoreState`].
//!
//! Each command maps onto one component operation. Component errors are
//! turned into strings at this boundary, the same way every surface reports
//! them to the user.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::capabilities::{AudioPlayer, CapabilityError, Notifier};
use crate::core_state::CoreState;
use crate::emergency::{HOLD_STEP, HOLD_TICK};
use crate::models::{
    BookingForm, EmergencyContact, HospitalFilter, ScannedMedicine, Tab, TimeSlot, UserProfile,
};

const HELP: &str = "\
Commands:
  profile                         show the saved profile
  profile <name> <lang> [phone]   save the profile
  condition <name>                add a known condition to the profile
  lang <code>                     set the recognition language
  say <text>                      talk to the assistant
  tab <name>                      open voice|medications|hospitals|appointments|emergency|timeline
  meds                            list medications
  med add <name>;<dosage>;<m,a,n> add a medication
  med take <n>                    mark the n-th medication taken
  med check <name>                look up a medicine
  med scan <image path>           read a prescription photo
  med accept <n>                  track the n-th scanned medicine
  remind                          notify about pending doses
  hospitals [filter]              list nearby facilities (all|emergency|clinic|government)
  hospital <n>                    show the n-th facility on the map
  book <doctor>;<clinic phone>;<patient>;<patient phone>[;time[;symptoms]]
  call                            show the call status
  call reset                      start over
  contact add <name>;<phone>;<relation>
  contacts                        list emergency contacts
  sos                             hold the SOS button until it fires
  sos cancel                      cancel an active SOS
  log <severity> <description>    record a symptom
  logs                            show the symptom timeline
  quit";

/// Prints notifications to the terminal.
pub struct ConsoleNotifier;

#[async_trait::async_trait]
impl Notifier for ConsoleNotifier {
    fn is_available(&self) -> bool {
        true
    }

    async fn request_permission(&self) -> bool {
        true
    }

    fn notify(&self, title: &str, body: &str) -> Result<(), CapabilityError> {
        tracing::info!(%title, "Notification shown");
        println!("[{title}] {body}");
        Ok(())
    }
}

/// Terminal hosts have no speaker; spoken replies are only logged.
pub struct MutedAudio;

impl AudioPlayer for MutedAudio {
    fn play(&self, mp3: &[u8]) -> Result<(), CapabilityError> {
        tracing::debug!(bytes = mp3.len(), "Skipping audio reply");
        Ok(())
    }
}

pub struct Console {
    state: Arc<CoreState>,
    scanned: Mutex<Vec<ScannedMedicine>>,
}

fn split_fields(rest: &str) -> Vec<&str> {
    rest.split(';').map(str::trim).collect()
}

fn parse_index(raw: &str) -> Result<usize, String> {
    match raw.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n - 1),
        _ => Err(format!("Expected a positive number, got '{raw}'")),
    }
}

fn parse_slots(raw: &str) -> Result<Vec<TimeSlot>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| match s.to_lowercase().as_str() {
            "m" | "morning" => Ok(TimeSlot::Morning),
            "a" | "afternoon" => Ok(TimeSlot::Afternoon),
            "n" | "night" => Ok(TimeSlot::Night),
            other => Err(format!("Unknown time slot '{other}'")),
        })
        .collect()
}

fn image_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}

impl Console {
    pub fn new(state: Arc<CoreState>) -> Self {
        Self {
            state,
            scanned: Mutex::new(Vec::new()),
        }
    }

    /// Read commands from stdin until `quit` or end of input.
    pub async fn run(self) -> std::io::Result<()> {
        println!("{} v{}. Type 'help' for commands.", crate::config::APP_NAME, crate::config::APP_VERSION);
        if self.state.needs_setup() {
            println!("No profile yet: start with 'profile <name> <lang> [phone]'.");
        }
        if let Some(greeting) = self.state.voice.messages().first() {
            println!("{}", greeting.text);
        }

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if matches!(line, "quit" | "exit") {
                break;
            }
            match self.execute(line).await {
                Ok(out) => println!("{out}"),
                Err(e) => eprintln!("error: {e}"),
            }
            for alert in self.state.pump_events().await {
                println!("[alert] {alert}");
            }
        }
        Ok(())
    }

    pub async fn execute(&self, line: &str) -> Result<String, String> {
        let (cmd, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();
        match cmd {
            "help" => Ok(HELP.to_string()),
            "profile" if rest.is_empty() => Ok(self
                .state
                .profile()
                .map(|p| format!("{} ({}) conditions: {:?}", p.name, p.language, p.conditions_list()))
                .unwrap_or_else(|| "No profile saved".to_string())),
            "profile" => self.save_profile(rest),
            "condition" => self.add_condition(rest),
            "lang" => {
                self.state.voice.set_language(rest);
                Ok(format!("Language: {}", self.state.voice.language().label))
            }
            "say" => {
                let reply = self.state.voice.send_typed(rest).await.map_err(|e| e.to_string())?;
                let chip = reply
                    .action
                    .map(|a| format!("  [{}]", a.label))
                    .unwrap_or_default();
                Ok(format!("{}{chip}", reply.text))
            }
            "tab" => {
                let tab: Tab = rest.parse().map_err(|e: crate::models::ParseEnumError| e.to_string())?;
                self.state.open_tab(tab).await;
                Ok(format!("Opened {tab}"))
            }
            "meds" => Ok(self.list_medications()),
            "med" => self.medication(rest).await,
            "remind" => {
                let shown = self.state.remind_medications().await;
                Ok(format!("{shown} reminder(s) shown"))
            }
            "hospitals" => self.hospitals(rest).await,
            "hospital" => {
                let h = self
                    .state
                    .hospitals
                    .select(parse_index(rest)?)
                    .map_err(|e| e.to_string())?;
                Ok(format!(
                    "{} - {} ({:.1} km) {}",
                    h.name,
                    h.address,
                    h.distance_km,
                    h.tel_uri().unwrap_or_default()
                ))
            }
            "book" => self.book(rest).await,
            "call" if rest == "reset" => {
                self.state.appointments.reset();
                Ok("Ready for a new booking".to_string())
            }
            "call" => {
                let s = self.state.appointments.snapshot();
                let mut out = format!("{} {}", s.status, s.duration_display());
                if let Some(err) = s.last_error {
                    out.push_str(&format!(" - {err}"));
                }
                Ok(out)
            }
            "contact" => {
                let fields = split_fields(rest.strip_prefix("add").unwrap_or(rest));
                let &[name, phone, relation] = fields.as_slice() else {
                    return Err("Usage: contact add <name>;<phone>;<relation>".to_string());
                };
                self.state
                    .emergency
                    .add_contact(EmergencyContact::new(name, phone, relation))
                    .map_err(|e| e.to_string())?;
                Ok(format!("{} contact(s)", self.state.emergency.contacts().len()))
            }
            "contacts" => Ok(self
                .state
                .emergency
                .contacts()
                .iter()
                .enumerate()
                .map(|(i, c)| format!("{}. {} {} ({})", i + 1, c.name, c.phone, c.relation))
                .collect::<Vec<_>>()
                .join("\n")),
            "sos" if rest == "cancel" => {
                self.state.emergency.cancel().await.map_err(|e| e.to_string())?;
                Ok("SOS cancelled".to_string())
            }
            "sos" => self.sos().await,
            "log" => {
                let (severity, description) = rest.split_once(' ').unwrap_or((rest, ""));
                let severity: u8 = severity
                    .parse()
                    .map_err(|_| format!("Severity must be a number, got '{severity}'"))?;
                let entry = self
                    .state
                    .timeline
                    .record(description, severity)
                    .await
                    .map_err(|e| e.to_string())?;
                Ok(format!("Logged at {}", entry.timestamp.format("%Y-%m-%d %H:%M")))
            }
            "logs" => {
                let logs = self.state.timeline.refresh().await.map_err(|e| e.to_string())?;
                Ok(logs
                    .iter()
                    .map(|l| {
                        format!(
                            "{} [{}/10 {}] {}",
                            l.timestamp.format("%d %b %H:%M"),
                            l.severity,
                            crate::models::severity_band(l.severity),
                            l.description
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n"))
            }
            other => Err(format!("Unknown command '{other}'. Type 'help'.")),
        }
    }

    fn save_profile(&self, rest: &str) -> Result<String, String> {
        let mut parts = rest.split_whitespace();
        let name = parts.next().unwrap_or_default();
        let language = parts.next().unwrap_or("hi");
        let mut profile = self
            .state
            .profile()
            .unwrap_or_else(|| UserProfile::new(name, language));
        profile.name = name.to_string();
        profile.language = language.to_string();
        profile.phone = parts.next().map(str::to_string);

        let saved = self.state.save_profile(profile).map_err(|e| e.to_string())?;
        Ok(format!("Saved profile for {}", saved.name))
    }

    fn add_condition(&self, condition: &str) -> Result<String, String> {
        let profile = self
            .state
            .profile()
            .ok_or_else(|| "Save a profile first".to_string())?
            .with_condition(condition.trim());
        let saved = self.state.save_profile(profile).map_err(|e| e.to_string())?;
        Ok(format!("Conditions: {:?}", saved.conditions_list()))
    }

    fn list_medications(&self) -> String {
        let meds = self.state.medications.list();
        if meds.is_empty() {
            return "No medications".to_string();
        }
        meds.iter()
            .enumerate()
            .map(|(i, m)| {
                let times: Vec<&str> = m.times.iter().map(TimeSlot::as_str).collect();
                let mark = if m.taken_today { "x" } else { " " };
                format!("{}. [{mark}] {} {} - {}", i + 1, m.name, m.dosage, times.join(", "))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    async fn medication(&self, rest: &str) -> Result<String, String> {
        let (sub, args) = rest.split_once(' ').unwrap_or((rest, ""));
        let meds = &self.state.medications;
        match sub {
            "add" => {
                let fields = split_fields(args);
                let &[name, dosage, slots] = fields.as_slice() else {
                    return Err("Usage: med add <name>;<dosage>;<m,a,n>".to_string());
                };
                let med = meds
                    .add(name, dosage, parse_slots(slots)?)
                    .map_err(|e| e.to_string())?;
                Ok(format!("Added {}", med.name))
            }
            "take" => {
                let list = meds.list();
                let med = list
                    .get(parse_index(args)?)
                    .ok_or_else(|| format!("No medication {args}"))?;
                let changed = meds.mark_taken(&med.id).await.map_err(|e| e.to_string())?;
                Ok(if changed {
                    format!("{} taken", med.name)
                } else {
                    format!("{} was already taken today", med.name)
                })
            }
            "check" => {
                let info = meds.check_medicine(args).await.map_err(|e| e.to_string())?;
                Ok(format!(
                    "{}\nUses: {}\nSide effects: {}",
                    info.what_it_is, info.uses, info.side_effects
                ))
            }
            "scan" => {
                let path = Path::new(args);
                let bytes = tokio::fs::read(path)
                    .await
                    .map_err(|e| format!("Cannot read {}: {e}", path.display()))?;
                let found = meds
                    .scan_prescription(&bytes, image_type_for(path))
                    .await
                    .map_err(|e| e.to_string())?;
                let out = found
                    .iter()
                    .enumerate()
                    .map(|(i, s)| format!("{}. {} {} ({})", i + 1, s.name, s.dosage, s.timing))
                    .collect::<Vec<_>>()
                    .join("\n");
                *self.scanned.lock().unwrap_or_else(PoisonError::into_inner) = found;
                Ok(out)
            }
            "accept" => {
                let index = parse_index(args)?;
                let scanned = self
                    .scanned
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .get(index)
                    .cloned()
                    .ok_or_else(|| format!("No scanned medicine {args}"))?;
                let med = meds.accept_suggestion(&scanned).map_err(|e| e.to_string())?;
                Ok(format!("Added {}", med.name))
            }
            _ => Err("Usage: med add|take|check|scan|accept ...".to_string()),
        }
    }

    async fn hospitals(&self, filter: &str) -> Result<String, String> {
        let locator = &self.state.hospitals;
        if !filter.is_empty() {
            let filter: HospitalFilter = filter.parse().map_err(|e: crate::models::ParseEnumError| e.to_string())?;
            locator.set_filter(filter);
        }
        if locator.position().is_none() {
            self.state.open_tab(Tab::Hospitals).await;
        }
        if let Some(err) = locator.error() {
            return Err(err);
        }

        let mut out = Vec::new();
        if let Some(notice) = locator.notice() {
            out.push(notice.to_string());
        }
        for (i, h) in locator.visible().iter().enumerate() {
            let er = if h.emergency { " 24x7 ER" } else { "" };
            out.push(format!("{}. {} [{}{er}] {:.1} km", i + 1, h.name, h.kind, h.distance_km));
        }
        Ok(out.join("\n"))
    }

    async fn book(&self, rest: &str) -> Result<String, String> {
        let fields = split_fields(rest);
        if fields.len() < 4 {
            return Err(
                "Usage: book <doctor>;<clinic phone>;<patient>;<patient phone>[;time[;symptoms]]"
                    .to_string(),
            );
        }
        let field = |i: usize| fields.get(i).map(|s| s.to_string()).unwrap_or_default();
        let form = BookingForm {
            doctor_name: field(0),
            clinic_phone: field(1),
            patient_name: field(2),
            patient_phone: field(3),
            preferred_time: field(4),
            symptoms: field(5),
        };
        let session = self
            .state
            .appointments
            .submit(form)
            .await
            .map_err(|e| e.to_string())?;
        match session.last_error {
            Some(err) => Err(err),
            None => Ok(session.status.label().to_string()),
        }
    }

    async fn sos(&self) -> Result<String, String> {
        let sos = &self.state.emergency;
        let ticks = u32::from(100 / HOLD_STEP) + 1;
        sos.press();
        tokio::time::sleep(HOLD_TICK * ticks).await;
        sos.release();

        let event = sos.snapshot();
        Ok(format!(
            "SOS {} - {}s to cancel ('sos cancel')",
            event.state, event.countdown_secs
        ))
    }
}
