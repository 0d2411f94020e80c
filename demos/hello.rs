//! Minimal walkthrough: one session, a couple of producers, and a dump.

use std::fmt;
use std::fmt::Write as _;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use dispatchq::*;

struct Ime {
    started: bool,
    shown: bool,
}

impl CallTarget for Ime {
    fn start_input(&mut self, info: EditorInfo, restarting: bool) {
        println!("start_input: type={} restarting={}", info.input_type, restarting);
        self.started = true;
    }

    fn show_soft_input(&mut self, flags: u32, result: Option<ResultSink>) {
        println!("show_soft_input: flags={}", flags);
        self.shown = true;
        if let Some(result) = result {
            result.complete(true);
        }
    }

    fn update_selection(&mut self, update: SelectionUpdate) {
        println!("update_selection: {}..{}", update.sel_start, update.sel_end);
    }

    fn dump(&mut self, w: &mut dyn fmt::Write, _args: &[String]) -> fmt::Result {
        writeln!(w, "  ime: started={} shown={}", self.started, self.shown)
    }
}

fn main() {
    simple_logger::SimpleLogger::new().init().unwrap();

    let host = ServiceHost::new();
    let wrapper = host
        .create_session(Box::new(Ime {
            started: false,
            shown: false,
        }))
        .unwrap();
    let proxy = wrapper.proxy();
    let dispatch = DispatchLoop::spawn(wrapper);

    // One producer drives the editor lifecycle...
    let editor = {
        let proxy = proxy.clone();
        thread::spawn(move || {
            proxy.start_input(
                EditorInfo {
                    input_type: 1,
                    initial_sel_start: 0,
                    initial_sel_end: 0,
                    hint: Some("type here".to_owned()),
                },
                false,
            );
            proxy.update_selection(SelectionUpdate {
                old_sel_start: 0,
                old_sel_end: 0,
                sel_start: 4,
                sel_end: 4,
                candidates_start: -1,
                candidates_end: -1,
            });
        })
    };

    // ...while another asks for the keyboard and waits for the result.
    let (tx, rx) = mpsc::channel();
    proxy.show_soft_input(0, Some(ResultSink::new(move |shown| tx.send(shown).unwrap())));
    editor.join().unwrap();
    println!("keyboard shown: {}", rx.recv().unwrap());

    thread::sleep(Duration::from_millis(50));
    let mut out = String::new();
    proxy.dump(&mut out, &[]).unwrap();
    print!("{}", out);

    proxy.finish_session();
    drop(dispatch);
    host.destroy();
}
