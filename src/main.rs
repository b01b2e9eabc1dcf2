//! A small REPL for exercising the `persisted` containers from the
//! command line.
//!
//! This is a developer convenience, not a network service: it reads
//! commands from stdin and dispatches them to whichever container the
//! command names, each backed by its own file under `data/`. Run with
//! `RUST_LOG=debug` to see the log engine's append/replay/compaction
//! trace lines.

use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;

use persisted::{Error, PersistedList, PersistedMap, SavedPageStack};
use serde_json::Value;

fn main() {
    env_logger::init();

    let mut lists: HashMap<String, PersistedList> = HashMap::new();
    let mut maps: HashMap<String, PersistedMap> = HashMap::new();
    let mut stacks: HashMap<String, SavedPageStack> = HashMap::new();

    println!("persisted REPL. Type 'help' for commands, 'exit' to quit.");

    loop {
        print!("persisted> ");
        if io::stdout().flush().is_err() {
            break;
        }

        let mut input = String::new();
        if io::stdin().read_line(&mut input).unwrap_or(0) == 0 {
            break;
        }

        if !handle_line(&input, &mut lists, &mut maps, &mut stacks) {
            break;
        }
    }
}

fn handle_line(
    input: &str,
    lists: &mut HashMap<String, PersistedList>,
    maps: &mut HashMap<String, PersistedMap>,
    stacks: &mut HashMap<String, SavedPageStack>,
) -> bool {
    let words: Vec<&str> = input.trim().split_whitespace().collect();
    let Some(&command) = words.first() else {
        return true;
    };

    match command {
        "exit" | "quit" => {
            println!("Goodbye!");
            return false;
        }
        "help" => print_help(),
        "list" => dispatch_list(&words[1..], lists),
        "map" => dispatch_map(&words[1..], maps),
        "stack" => dispatch_stack(&words[1..], stacks),
        other => println!("Unknown command '{other}'. Type 'help' for commands."),
    }

    true
}

fn print_help() {
    println!(
        "\nAvailable commands:\n\
         list <path> append <json>\n\
         list <path> set <index> <json>\n\
         list <path> get <index>\n\
         list <path> delete <index>\n\
         list <path> show\n\
         map <path> set <key-json> <value-json>\n\
         map <path> get <key-json>\n\
         map <path> delete <key-json>\n\
         stack <path> add <url> <title> <timestamp|now>\n\
         stack <path> delete <url>\n\
         stack <path> show\n\
         exit\n"
    );
}

fn open_list_or_warn(path: &str) -> Option<PersistedList> {
    match PersistedList::open(PathBuf::from(path)) {
        Ok(list) => Some(list),
        Err(e) => {
            println!("Error opening list at {path}: {e}");
            None
        }
    }
}

fn dispatch_list(args: &[&str], lists: &mut HashMap<String, PersistedList>) {
    let Some((&path, rest)) = args.split_first() else {
        println!("usage: list <path> <append|set|get|delete|show> ...");
        return;
    };

    if !lists.contains_key(path) {
        match open_list_or_warn(path) {
            Some(list) => {
                lists.insert(path.to_string(), list);
            }
            None => return,
        }
    }
    let list = lists.get(path).expect("just inserted");

    match rest {
        ["append", json] => report(parse_json(json).and_then(|v| list.append(v))),
        ["set", index, json] => {
            let result = index
                .parse::<usize>()
                .map_err(|_| Error::MalformedLog("bad index".into()))
                .and_then(|i| parse_json(json).and_then(|v| list.set(i, v)));
            report(result);
        }
        ["get", index] => match index.parse::<usize>() {
            Ok(i) => match list.get(i) {
                Ok(v) => println!("{v}"),
                Err(e) => println!("Error: {e}"),
            },
            Err(_) => println!("Error: bad index"),
        },
        ["delete", index] => match index.parse::<usize>() {
            Ok(i) => report(list.delete_at(i).map(|_| ())),
            Err(_) => println!("Error: bad index"),
        },
        ["show"] => {
            for value in list.iterate() {
                println!("{value}");
            }
        }
        _ => println!("usage: list <path> <append|set|get|delete|show> ..."),
    }
}

fn open_map_or_warn(path: &str) -> Option<PersistedMap> {
    match PersistedMap::open(PathBuf::from(path)) {
        Ok(map) => Some(map),
        Err(e) => {
            println!("Error opening map at {path}: {e}");
            None
        }
    }
}

fn dispatch_map(args: &[&str], maps: &mut HashMap<String, PersistedMap>) {
    let Some((&path, rest)) = args.split_first() else {
        println!("usage: map <path> <set|get|delete|show> ...");
        return;
    };

    if !maps.contains_key(path) {
        match open_map_or_warn(path) {
            Some(map) => {
                maps.insert(path.to_string(), map);
            }
            None => return,
        }
    }
    let map = maps.get(path).expect("just inserted");

    match rest {
        ["set", key, value] => {
            let result = parse_json(key).and_then(|k| parse_json(value).and_then(|v| map.set(k, v)));
            report(result);
        }
        ["get", key] => match parse_json(key).and_then(|k| map.get(k)) {
            Ok(v) => println!("{v}"),
            Err(e) => println!("Error: {e}"),
        },
        ["delete", key] => report(parse_json(key).and_then(|k| map.delete(k)).map(|_| ())),
        ["show"] => {
            for (k, v) in map.iterate_items() {
                println!("{k} -> {v}");
            }
        }
        _ => println!("usage: map <path> <set|get|delete|show> ..."),
    }
}

fn open_stack_or_warn(path: &str) -> Option<SavedPageStack> {
    match SavedPageStack::open(PathBuf::from(path)) {
        Ok(stack) => Some(stack),
        Err(e) => {
            println!("Error opening stack at {path}: {e}");
            None
        }
    }
}

fn dispatch_stack(args: &[&str], stacks: &mut HashMap<String, SavedPageStack>) {
    let Some((&path, rest)) = args.split_first() else {
        println!("usage: stack <path> <add|delete|show> ...");
        return;
    };

    if !stacks.contains_key(path) {
        match open_stack_or_warn(path) {
            Some(stack) => {
                stacks.insert(path.to_string(), stack);
            }
            None => return,
        }
    }
    let stack = stacks.get(path).expect("just inserted");

    match rest {
        ["add", url, title, "now"] => report(stack.add_now(url, title)),
        ["add", url, title, timestamp] => {
            let result = timestamp
                .parse::<f64>()
                .map_err(|_| Error::MalformedLog("bad timestamp".into()))
                .and_then(|ts| stack.add(url, title, ts));
            report(result);
        }
        ["delete", url] => report(stack.delete(url)),
        ["show"] => {
            for page in stack.as_sorted_list() {
                println!("{} | {} | {}", page.timestamp, page.title, page.url);
            }
        }
        _ => println!("usage: stack <path> <add|delete|show> ..."),
    }
}

fn parse_json(input: &str) -> Result<Value, Error> {
    serde_json::from_str(input).map_err(Error::Encoding)
}

fn report(result: Result<(), Error>) {
    match result {
        Ok(()) => println!("ok"),
        Err(e) => println!("Error: {e}"),
    }
}
