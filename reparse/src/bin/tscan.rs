// Event dump runner: prints one classified event per line.

use reparse::*;

fn describe(event: &ClassifiedEvent, table: &LongOptionTable) -> String {
    match event {
        ClassifiedEvent::ShortOption(c, None) => format!("short {}", c),
        ClassifiedEvent::ShortOption(c, Some(v)) => format!("short {} {}", c, quote(v)),
        ClassifiedEvent::LongOption(idx, value) => {
            let name = table.get(*idx).map_or("?", |e| e.name.as_str());
            match value {
                Some(v) => format!("long {} {}", name, quote(v)),
                None => format!("long {}", name),
            }
        }
        ClassifiedEvent::MissingArgument(fault) => format!("missing {}: {}", fault.token(), fault),
        ClassifiedEvent::UnrecognizedOption(fault) => {
            format!("unrecognized {}: {}", fault.token(), fault)
        }
        ClassifiedEvent::EndOfOptions => "end".to_string(),
    }
}

fn main() -> Result<()> {
    let Some(args) = std::env::args_os()
        .map(|arg| arg.into_string().ok())
        .collect::<Option<Vec<String>>>()
    else {
        eprintln!("tscan: arguments must be valid UTF-8");
        std::process::exit(2);
    };

    if args.len() < 3 {
        println!("usage: tscan SHORTSPEC LONGSPEC [ARG]...");
        std::process::exit(2);
    }

    let short = ShortOptionSpec::parse(&args[1]);
    let mut table = LongOptionTable::new();
    table.add_spec(&args[2], false)?;

    let input = &args[3..];
    let mut scanner = Scanner::new(input, &short, &table);
    loop {
        let event = scanner.step();
        println!("{}", describe(&event, &table));
        if event == ClassifiedEvent::EndOfOptions {
            break;
        }
    }

    for operand in scanner.operands() {
        println!("operand {}", quote(operand));
    }

    Ok(())
}
