use std::io::Write;
use std::path::PathBuf;

use color_eyre::eyre::{self, Context};
use debugger::{AdapterEvent, EvaluateContainer, RokuAdapter};
use launch_configuration::ConsoleOutput;
use tokio::sync::mpsc;

use crate::breakpoint_arg::BreakpointArg;
use crate::command::Command;
use crate::location::describe_frame;
use crate::session::SessionBreakpoints;

enum ShouldQuit {
    True,
    False,
}

pub struct App {
    adapter: RokuAdapter,
    breakpoints: SessionBreakpoints,
    staging_root: PathBuf,
    console_output: ConsoleOutput,
    input_rx: mpsc::UnboundedReceiver<String>,
}

impl App {
    pub fn new(
        adapter: RokuAdapter,
        breakpoints: SessionBreakpoints,
        staging_root: PathBuf,
        console_output: ConsoleOutput,
    ) -> Self {
        // handle input
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        std::thread::spawn(move || {
            let mut buffer = String::new();
            loop {
                buffer.clear();
                match std::io::stdin().read_line(&mut buffer) {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {
                        if input_tx.send(buffer.trim().to_owned()).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        Self {
            adapter,
            breakpoints,
            staging_root,
            console_output,
            input_rx,
        }
    }

    pub async fn run(&mut self) -> eyre::Result<()> {
        loop {
            match self.loop_step().await {
                Ok(ShouldQuit::True) => break,
                Ok(ShouldQuit::False) => {}
                Err(e) => eyre::bail!("Error running command: {e}"),
            }
        }
        Ok(())
    }

    /// Leave the device debugger and disconnect.
    pub async fn shutdown(&self) {
        self.adapter.destroy().await;
    }

    async fn loop_step(&mut self) -> eyre::Result<ShouldQuit> {
        print!("> ");
        std::io::stdout().flush()?;

        tokio::select! {
            input = self.input_rx.recv() => match input {
                Some(input) => self.handle_input(&input).await.context("handling command"),
                // stdin closed
                None => Ok(ShouldQuit::True),
            },
            event = self.adapter.events().recv() => match event {
                Some(event) => self.handle_adapter_event(event).await.context("handling adapter event"),
                None => Ok(ShouldQuit::True),
            },
        }
    }

    #[tracing::instrument(skip(self))]
    async fn handle_adapter_event(&self, event: AdapterEvent) -> eyre::Result<ShouldQuit> {
        match event {
            AdapterEvent::Start => println!("\nchannel started"),
            AdapterEvent::Suspend { thread_id } => {
                let frames = self.adapter.get_stack_trace().await;
                match frames.as_deref() {
                    Ok([frame, ..]) => println!(
                        "\nstopped at {}",
                        describe_frame(&self.staging_root, frame).await
                    ),
                    Ok([]) => println!("\nstopped (thread {thread_id:?})"),
                    Err(e) => {
                        tracing::warn!(error = %e, "reading the stack after a stop");
                        println!("\nstopped (thread {thread_id:?})");
                    }
                }
            }
            AdapterEvent::CompileErrors(errors) => {
                println!("\ncompile failed:");
                for error in errors {
                    println!("  {}:{}: {}", error.path, error.line_number + 1, error.message);
                }
            }
            AdapterEvent::RuntimeError(error) => {
                println!("\nruntime error {}: {}", error.error_code, error.message);
            }
            AdapterEvent::CannotContinue => println!("\nexecution cannot continue"),
            AdapterEvent::ConsoleOutput(text) => {
                if self.console_output == ConsoleOutput::Full {
                    print!("{text}");
                }
            }
            AdapterEvent::UnhandledConsoleOutput(text) => {
                if self.console_output == ConsoleOutput::Normal {
                    print!("{text}");
                }
            }
            AdapterEvent::Close => {
                println!("\ndevice closed the connection");
                return Ok(ShouldQuit::True);
            }
        }
        Ok(ShouldQuit::False)
    }

    async fn handle_input(&mut self, input: &str) -> eyre::Result<ShouldQuit> {
        let adapter = &self.adapter;
        match Command::parse(input) {
            Command::Quit => return Ok(ShouldQuit::True),
            Command::Continue => {
                tracing::debug!("executing continue command");
                adapter.continue_execution().await.context("resuming execution")?;
            }
            Command::StepOver => adapter.step_over().await.context("stepping over")?,
            Command::StepInto => adapter.step_into().await.context("stepping in")?,
            Command::StepOut => adapter.step_out().await.context("stepping out")?,
            Command::Pause => adapter.pause().await.context("pausing")?,
            Command::Backtrace => match adapter.get_stack_trace().await {
                Ok(frames) => {
                    for frame in &frames {
                        println!(
                            "#{} {}",
                            frame.frame_id,
                            describe_frame(&self.staging_root, frame).await
                        );
                    }
                }
                Err(e) => println!("{e}"),
            },
            Command::Threads => match adapter.get_threads().await {
                Ok(threads) => {
                    for thread in threads {
                        let marker = if thread.is_selected { "*" } else { " " };
                        println!(
                            "{}{marker} {}({}) {}",
                            thread.thread_id,
                            thread.file_path,
                            thread.line_number,
                            thread.line_contents
                        );
                    }
                }
                Err(e) => println!("{e}"),
            },
            Command::Variables => match adapter.get_scope_variables().await {
                Ok(names) => println!("{}", names.join("\n")),
                Err(e) => println!("{e}"),
            },
            Command::Print(expression) => match adapter.get_variable(&expression).await {
                Ok(container) => print_container(&container),
                Err(e) => println!("{e}"),
            },
            Command::Break(location) => match location.parse::<BreakpointArg>() {
                Ok(arg) => match self.breakpoints.add(&arg) {
                    Some(breakpoint) if breakpoint.verified => {
                        println!("breakpoint at {}:{} is active", arg.path.display(), arg.line)
                    }
                    _ => println!(
                        "breakpoint at {}:{} was not set before launch and will not stop",
                        arg.path.display(),
                        arg.line
                    ),
                },
                Err(e) => println!("{e}"),
            },
            Command::Raw(command) => match adapter.evaluate(&command).await {
                Ok(output) => print!("{output}"),
                Err(e) => println!("{e}"),
            },
            Command::Empty => {}
            Command::Unknown(other) => println!("Unhandled command: '{}'", other),
        }
        Ok(ShouldQuit::False)
    }
}

fn print_container(container: &EvaluateContainer) {
    println!("{} ({}) = {}", container.name, container.variable_type, container.value);
    for child in &container.children {
        println!("  {} ({}) = {}", child.name, child.variable_type, child.value);
    }
}
