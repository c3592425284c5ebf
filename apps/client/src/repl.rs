//! Terminal projection of the workflow: translates typed commands into
//! engine commands and renders the engine's state snapshots. Pure
//! projection, no business logic lives here.

use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use bytes::Bytes;
use tokio::io::AsyncBufReadExt;
use tokio::sync::watch;

use crate::api::{ResumeFile, ResumeService};
use crate::session::SessionStore;
use crate::workflow::engine::WorkflowEngine;
use crate::workflow::state::WorkflowState;

const DEFAULT_DOWNLOAD_PATH: &str = "ats_optimized_resume.pdf";

pub struct Repl {
    engine: Arc<WorkflowEngine>,
    service: Arc<dyn ResumeService>,
    session: Arc<SessionStore>,
    snapshots: watch::Receiver<WorkflowState>,
}

impl Repl {
    pub fn new(
        engine: Arc<WorkflowEngine>,
        service: Arc<dyn ResumeService>,
        session: Arc<SessionStore>,
    ) -> Self {
        let snapshots = engine.subscribe();
        Self {
            engine,
            service,
            session,
            snapshots,
        }
    }

    pub async fn run(&self) -> Result<()> {
        println!("OptiCV resume optimizer. Type 'help' for commands.");
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        loop {
            print!("opticv> ");
            io::stdout().flush()?;
            let Some(line) = lines.next_line().await? else {
                break;
            };
            if !self.dispatch(line.trim()).await {
                break;
            }
        }
        Ok(())
    }

    /// Handles one command line. Returns false when the user quits.
    /// Every error is rendered as a message; nothing aborts the loop.
    async fn dispatch(&self, line: &str) -> bool {
        let (command, rest) = match line.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (line, ""),
        };

        match command {
            "" => {}
            "help" => print_help(),
            "quit" | "exit" => return false,
            "status" => render(&self.snapshots.borrow()),
            "otp" => self.request_otp(rest).await,
            "signup" => self.signup(rest).await,
            "login" => self.login(rest).await,
            "logout" => {
                self.engine.logout();
                println!("logged out");
            }
            "file" => self.load_file(rest).await,
            "jd" => {
                self.engine.set_job_description(rest);
                if rest.is_empty() {
                    println!("job description cleared");
                } else {
                    println!("job description set ({} chars)", rest.len());
                }
            }
            "preview" => match self.snapshots.borrow().rewritten_resume.clone() {
                Some(text) => println!("{text}"),
                None => println!("nothing to preview yet, run 'rewrite' first"),
            },
            // Route guard: the workflow screens sit behind the login.
            "upload" | "score" | "rewrite" | "download" if !self.session.has_token() => {
                println!("please log in first ('login <email> <password>')");
            }
            "upload" => match self.engine.upload().await {
                Ok(()) => println!("resume uploaded successfully"),
                Err(err) => println!("error: {err}"),
            },
            "score" => match self.engine.check_ats_score().await {
                Ok(score) => println!("original ATS score: {score}%"),
                Err(err) => println!("error: {err}"),
            },
            "rewrite" => match self.engine.rewrite().await {
                Ok(()) => match self.snapshots.borrow().optimized_ats_score {
                    Some(score) => {
                        println!("resume optimized, new ATS score: {score}% (see 'preview')")
                    }
                    None => println!("resume optimized (see 'preview')"),
                },
                Err(err) => println!("error: {err}"),
            },
            "download" => self.download(rest).await,
            _ => println!("unknown command '{command}', type 'help'"),
        }
        true
    }

    async fn request_otp(&self, rest: &str) {
        if rest.is_empty() {
            println!("usage: otp <email>");
            return;
        }
        match self.service.request_otp(rest).await {
            Ok(response) => println!("{}", response.message),
            Err(err) => println!("error: {err}"),
        }
    }

    async fn signup(&self, rest: &str) {
        let mut parts = rest.split_whitespace();
        match (parts.next(), parts.next(), parts.next()) {
            (Some(email), Some(otp), Some(password)) => {
                match self.service.signup(email, otp, password).await {
                    Ok(auth) => {
                        self.session.set_token(auth.token);
                        println!("signed up and logged in as {email}");
                    }
                    Err(err) => println!("error: {err}"),
                }
            }
            _ => println!("usage: signup <email> <otp> <password>"),
        }
    }

    async fn login(&self, rest: &str) {
        let mut parts = rest.split_whitespace();
        match (parts.next(), parts.next()) {
            (Some(email), Some(password)) => match self.service.login(email, password).await {
                Ok(auth) => {
                    self.session.set_token(auth.token);
                    println!("logged in as {email}");
                }
                Err(err) => println!("error: {err}"),
            },
            _ => println!("usage: login <email> <password>"),
        }
    }

    async fn load_file(&self, path: &str) {
        if path.is_empty() {
            println!("usage: file <path-to-pdf>");
            return;
        }
        match tokio::fs::read(path).await {
            Ok(bytes) => {
                let file_name = Path::new(path)
                    .file_name()
                    .and_then(|name| name.to_str())
                    .unwrap_or("resume.pdf")
                    .to_string();
                let len = bytes.len();
                self.engine.set_resume_file(ResumeFile {
                    file_name,
                    bytes: Bytes::from(bytes),
                });
                println!("resume loaded ({len} bytes)");
            }
            Err(err) => println!("error: could not read {path}: {err}"),
        }
    }

    async fn download(&self, rest: &str) {
        let path = if rest.is_empty() {
            DEFAULT_DOWNLOAD_PATH
        } else {
            rest
        };
        match self.engine.download().await {
            Ok(blob) => match tokio::fs::write(path, &blob).await {
                Ok(()) => println!("saved optimized resume to {path}"),
                Err(err) => println!("error: could not write {path}: {err}"),
            },
            Err(err) => println!("error: {err}"),
        }
    }
}

fn render(state: &WorkflowState) {
    let file = state
        .resume_file
        .as_ref()
        .map(|file| file.file_name.as_str())
        .unwrap_or("(none)");
    println!("resume file:     {file}");
    println!("job description: {} chars", state.job_description.len());
    println!("original score:  {}", fmt_score(state.original_ats_score));
    println!("optimized score: {}", fmt_score(state.optimized_ats_score));
    println!(
        "rewritten:       {}",
        if state.rewritten_resume.is_some() {
            "yes"
        } else {
            "no"
        }
    );
    match &state.download_artifact {
        Some(blob) => println!("downloaded:      {} bytes", blob.len()),
        None => println!("downloaded:      no"),
    }
    if state.phases.any() {
        let mut in_flight = Vec::new();
        if state.phases.uploading {
            in_flight.push("uploading");
        }
        if state.phases.scoring {
            in_flight.push("scoring");
        }
        if state.phases.rewriting {
            in_flight.push("rewriting");
        }
        if state.phases.downloading {
            in_flight.push("downloading");
        }
        println!("in flight:       {}", in_flight.join(", "));
    }
}

fn fmt_score(score: Option<f64>) -> String {
    match score {
        Some(score) => format!("{score}%"),
        None => "-".to_string(),
    }
}

fn print_help() {
    println!("account:");
    println!("  otp <email>                      request a signup OTP");
    println!("  signup <email> <otp> <password>  create an account");
    println!("  login <email> <password>         log in");
    println!("  logout                           log out and clear the workspace");
    println!("workflow:");
    println!("  file <path>                      select a resume PDF");
    println!("  jd <text>                        set the job description");
    println!("  upload                           register resume and JD with the backend");
    println!("  score                            check the original ATS score");
    println!("  rewrite                          optimize the resume with AI");
    println!("  preview                          print the rewritten resume");
    println!("  download [path]                  save the optimized PDF");
    println!("misc:");
    println!("  status | help | quit");
}
