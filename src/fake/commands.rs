//! Command interpreter of the fake server.

use bytes::Bytes;

use crate::fake::state::{
    AddOutcome, Cuckoo, CuckooParams, FakeServerState, Keyspace, StoreError, DATABASES,
};
use crate::proto::frame::Frame;

const MAX_BUCKET_SIZE: u64 = 255;
const MAX_ITERATIONS: u64 = 65535;
const MAX_EXPANSION: u64 = 32768;

/// Per-connection state the interpreter may change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Session {
    pub(crate) protocol: u8,
    pub(crate) name: Option<Bytes>,
    pub(crate) db: usize,
    pub(crate) authenticated: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            protocol: 2,
            name: None,
            db: 0,
            authenticated: false,
        }
    }
}

impl Session {
    fn null(&self) -> Frame {
        if self.protocol >= 3 {
            Frame::Null
        } else {
            Frame::BulkString(None)
        }
    }

    /// Key/value reply: a map under RESP3, a flat array under RESP2.
    fn pairs(&self, entries: Vec<(&'static str, Frame)>) -> Frame {
        if self.protocol >= 3 {
            Frame::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (Frame::simple(k), v))
                    .collect(),
            )
        } else {
            Frame::Array(
                entries
                    .into_iter()
                    .flat_map(|(k, v)| [Frame::simple(k), v])
                    .collect(),
            )
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CommandError {
    InvalidCommandFrame,
    NotImplemented(String),
    WrongArity(String),
    Syntax,
    InvalidInteger,
    Invalid(&'static str),
    Store(StoreError),
}

impl From<StoreError> for CommandError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl CommandError {
    /// Error reply for everything except `NotImplemented`, which never
    /// reaches the wire.
    pub(crate) fn to_frame(&self) -> Frame {
        match self {
            CommandError::InvalidCommandFrame => Frame::error("ERR invalid command frame"),
            CommandError::NotImplemented(cmd) => Frame::error(format!("ERR unknown command '{cmd}'")),
            CommandError::WrongArity(cmd) => Frame::error(format!(
                "ERR wrong number of arguments for '{cmd}' command"
            )),
            CommandError::Syntax => Frame::error("ERR syntax error"),
            CommandError::InvalidInteger => {
                Frame::error("ERR value is not an integer or out of range")
            }
            CommandError::Invalid(message) => Frame::error(*message),
            CommandError::Store(e) => Frame::error(e.message()),
        }
    }
}

/// Flattens a request frame into its arguments.
pub(crate) fn frame_to_argv(frame: Frame) -> Result<Vec<Bytes>, CommandError> {
    let Frame::Array(items) = frame else {
        return Err(CommandError::InvalidCommandFrame);
    };
    let argv = items
        .into_iter()
        .map(|item| match item {
            Frame::BulkString(Some(b)) => Ok(b),
            Frame::SimpleString(s) => Ok(Bytes::from(s)),
            Frame::Integer(n) => Ok(Bytes::from(n.to_string())),
            _ => Err(CommandError::InvalidCommandFrame),
        })
        .collect::<Result<Vec<_>, _>>()?;
    if argv.is_empty() {
        return Err(CommandError::InvalidCommandFrame);
    }
    Ok(argv)
}

/// Runs one command against the server state.
pub(crate) fn dispatch(
    argv: &[Bytes],
    state: &mut FakeServerState,
    session: &mut Session,
) -> Result<Frame, CommandError> {
    let Some(raw_cmd) = argv.first() else {
        return Err(CommandError::InvalidCommandFrame);
    };
    let name = String::from_utf8_lossy(raw_cmd).to_ascii_uppercase();
    if state.requires_auth()
        && !session.authenticated
        && !matches!(name.as_str(), "AUTH" | "HELLO")
    {
        return Err(CommandError::Invalid("NOAUTH Authentication required."));
    }
    match name.as_str() {
        "PING" => ping(argv),
        "ECHO" => {
            arity(argv, 2, "echo")?;
            Ok(Frame::BulkString(Some(argv[1].clone())))
        }
        "AUTH" => auth(argv, state, session),
        "SELECT" => select(argv, session),
        "HELLO" => hello(argv, state, session),
        "CLIENT" => client(argv, session),
        "FLUSHALL" => {
            flush_arity(argv)?;
            state.reset();
            Ok(Frame::simple("OK"))
        }
        _ => {
            let db = state
                .database_mut(session.db)
                .ok_or(CommandError::Invalid("ERR DB index is out of range"))?;
            keyspace_command(&name, argv, db, session)
        }
    }
}

/// Commands that act on the selected database.
fn keyspace_command(
    name: &str,
    argv: &[Bytes],
    db: &mut Keyspace,
    session: &Session,
) -> Result<Frame, CommandError> {
    match name {
        "FLUSHDB" => {
            flush_arity(argv)?;
            db.clear();
            Ok(Frame::simple("OK"))
        }
        "GET" => {
            arity(argv, 2, "get")?;
            Ok(match db.get(&argv[1])? {
                Some(v) => Frame::bulk(Bytes::copy_from_slice(v)),
                None => session.null(),
            })
        }
        "SET" => {
            if argv.len() < 3 {
                return Err(wrong_arity("set"));
            }
            if argv.len() > 3 {
                return Err(CommandError::Syntax);
            }
            db.set(&argv[1], &argv[2]);
            Ok(Frame::simple("OK"))
        }
        "DEL" => {
            min_arity(argv, 2, "del")?;
            let removed = argv[1..].iter().filter(|key| db.del(key)).count();
            Ok(Frame::Integer(removed as i64))
        }
        "EXISTS" => {
            min_arity(argv, 2, "exists")?;
            let found = argv[1..].iter().filter(|key| db.contains_key(key)).count();
            Ok(Frame::Integer(found as i64))
        }
        "INCR" => {
            arity(argv, 2, "incr")?;
            Ok(Frame::Integer(db.incr_by(&argv[1], 1)?))
        }
        "INCRBY" => {
            arity(argv, 3, "incrby")?;
            let delta = parse_i64(&argv[2]).ok_or(CommandError::InvalidInteger)?;
            Ok(Frame::Integer(db.incr_by(&argv[1], delta)?))
        }
        "TYPE" => {
            arity(argv, 2, "type")?;
            let name = db.value(&argv[1]).map_or("none", |v| v.type_name());
            Ok(Frame::simple(name))
        }
        "CF.RESERVE" => cf_reserve(argv, db),
        "CF.ADD" | "CF.ADDNX" => {
            let nx = name == "CF.ADDNX";
            arity(argv, 3, if nx { "cf.addnx" } else { "cf.add" })?;
            let cf = db.cf_or_create(&argv[1], CuckooParams::default())?;
            match cf.add(&argv[2], nx) {
                AddOutcome::Added => Ok(Frame::Integer(1)),
                AddOutcome::Exists => Ok(Frame::Integer(0)),
                AddOutcome::Full => Err(StoreError::FilterFull.into()),
            }
        }
        "CF.INSERT" | "CF.INSERTNX" => cf_insert(argv, db, name == "CF.INSERTNX"),
        "CF.EXISTS" => {
            arity(argv, 3, "cf.exists")?;
            let found = db.cf(&argv[1])?.is_some_and(|cf| cf.contains(&argv[2]));
            Ok(Frame::Integer(i64::from(found)))
        }
        "CF.MEXISTS" => {
            min_arity(argv, 3, "cf.mexists")?;
            let cf = db.cf(&argv[1])?;
            Ok(Frame::Array(
                argv[2..]
                    .iter()
                    .map(|item| Frame::Integer(i64::from(cf.is_some_and(|cf| cf.contains(item)))))
                    .collect(),
            ))
        }
        "CF.COUNT" => {
            arity(argv, 3, "cf.count")?;
            let count = db.cf(&argv[1])?.map_or(0, |cf| cf.count(&argv[2]));
            Ok(Frame::Integer(count as i64))
        }
        "CF.DEL" => {
            arity(argv, 3, "cf.del")?;
            let removed = db.cf_existing(&argv[1])?.delete(&argv[2]);
            Ok(Frame::Integer(i64::from(removed)))
        }
        "CF.INFO" => {
            arity(argv, 2, "cf.info")?;
            let cf = db.cf(&argv[1])?.ok_or(StoreError::NotFound)?;
            Ok(cf_info(cf, session))
        }
        _ => Err(CommandError::NotImplemented(name.to_string())),
    }
}

fn ping(argv: &[Bytes]) -> Result<Frame, CommandError> {
    match argv.len() {
        1 => Ok(Frame::simple("PONG")),
        2 => Ok(Frame::BulkString(Some(argv[1].clone()))),
        _ => Err(wrong_arity("ping")),
    }
}

fn flush_arity(argv: &[Bytes]) -> Result<(), CommandError> {
    match argv {
        [_] => Ok(()),
        [_, mode] if mode.eq_ignore_ascii_case(b"SYNC") || mode.eq_ignore_ascii_case(b"ASYNC") => {
            Ok(())
        }
        _ => Err(CommandError::Syntax),
    }
}

/// `AUTH [username] password`. Without configured credentials the server
/// rejects every attempt, as an unprotected server does.
fn auth(
    argv: &[Bytes],
    state: &FakeServerState,
    session: &mut Session,
) -> Result<Frame, CommandError> {
    let (username, password) = match argv {
        [_, password] => (None, password),
        [_, username, password] => (Some(username), password),
        _ => return Err(wrong_arity("auth")),
    };
    if !state.requires_auth() {
        return Err(CommandError::Invalid(
            "ERR AUTH <password> called without any password configured for the default user. \
             Are you sure your configuration is correct?",
        ));
    }
    check_credentials(state, username.map(|u| &u[..]), password)?;
    session.authenticated = true;
    Ok(Frame::simple("OK"))
}

fn check_credentials(
    state: &FakeServerState,
    username: Option<&[u8]>,
    password: &[u8],
) -> Result<(), CommandError> {
    if state.check_credentials(username, password) {
        Ok(())
    } else {
        Err(CommandError::Invalid(
            "WRONGPASS invalid username-password pair or user is disabled.",
        ))
    }
}

fn select(argv: &[Bytes], session: &mut Session) -> Result<Frame, CommandError> {
    arity(argv, 2, "select")?;
    let db = parse_i64(&argv[1]).ok_or(CommandError::InvalidInteger)?;
    session.db = usize::try_from(db)
        .ok()
        .filter(|db| *db < DATABASES)
        .ok_or(CommandError::Invalid("ERR DB index is out of range"))?;
    Ok(Frame::simple("OK"))
}

fn hello(
    argv: &[Bytes],
    state: &FakeServerState,
    session: &mut Session,
) -> Result<Frame, CommandError> {
    let mut protocol = session.protocol;
    let mut rest = argv[1..].iter();
    if let Some(version) = rest.next() {
        protocol = match parse_i64(version) {
            Some(2) => 2,
            Some(3) => 3,
            Some(_) => return Err(CommandError::Invalid("NOPROTO unsupported protocol version")),
            None => {
                return Err(CommandError::Invalid(
                    "ERR Protocol version is not an integer or out of range",
                ))
            }
        };
    }
    let mut name = None;
    let mut authenticated = session.authenticated;
    while let Some(option) = rest.next() {
        if option.eq_ignore_ascii_case(b"AUTH") {
            let username = rest.next().ok_or(CommandError::Syntax)?;
            let password = rest.next().ok_or(CommandError::Syntax)?;
            check_credentials(state, Some(&username[..]), password)?;
            authenticated = true;
        } else if option.eq_ignore_ascii_case(b"SETNAME") {
            name = Some(rest.next().ok_or(CommandError::Syntax)?.clone());
        } else {
            return Err(CommandError::Syntax);
        }
    }

    if state.requires_auth() && !authenticated {
        return Err(CommandError::Invalid(
            "NOAUTH HELLO must be called with the client already authenticated",
        ));
    }

    session.protocol = protocol;
    session.authenticated = authenticated;
    if name.is_some() {
        session.name = name;
    }
    Ok(session.pairs(vec![
        ("server", Frame::bulk("valkey")),
        ("version", Frame::bulk("8.0.0")),
        ("proto", Frame::Integer(i64::from(protocol))),
        ("id", Frame::Integer(1)),
        ("mode", Frame::bulk("standalone")),
        ("role", Frame::bulk("master")),
        ("modules", Frame::Array(Vec::new())),
    ]))
}

fn client(argv: &[Bytes], session: &mut Session) -> Result<Frame, CommandError> {
    min_arity(argv, 2, "client")?;
    let sub = String::from_utf8_lossy(&argv[1]).to_ascii_uppercase();
    match sub.as_str() {
        "SETNAME" => {
            arity(argv, 3, "client|setname")?;
            session.name = Some(argv[2].clone());
            Ok(Frame::simple("OK"))
        }
        "GETNAME" => Ok(match &session.name {
            Some(name) => Frame::BulkString(Some(name.clone())),
            None => session.null(),
        }),
        _ => Err(CommandError::NotImplemented(format!("CLIENT {sub}"))),
    }
}

fn cf_reserve(argv: &[Bytes], db: &mut Keyspace) -> Result<Frame, CommandError> {
    min_arity(argv, 3, "cf.reserve")?;
    let mut params = CuckooParams {
        capacity: parse_u64(&argv[2])
            .filter(|c| *c > 0)
            .ok_or(CommandError::Invalid("ERR Bad capacity"))?,
        ..CuckooParams::default()
    };

    let mut rest = argv[3..].iter();
    while let Some(option) = rest.next() {
        let value = rest.next().ok_or(CommandError::Syntax)?;
        let option = String::from_utf8_lossy(option).to_ascii_uppercase();
        match option.as_str() {
            "BUCKETSIZE" => {
                params.bucket_size = parse_u64(value)
                    .filter(|v| (1..=MAX_BUCKET_SIZE).contains(v))
                    .ok_or(CommandError::Invalid("ERR Bad bucket size"))?;
            }
            "MAXITERATIONS" => {
                params.max_iterations = parse_u64(value)
                    .filter(|v| (1..=MAX_ITERATIONS).contains(v))
                    .ok_or(CommandError::Invalid("ERR Bad max iterations"))?;
            }
            "EXPANSION" => {
                params.expansion = parse_u64(value)
                    .filter(|v| *v <= MAX_EXPANSION)
                    .ok_or(CommandError::Invalid("ERR Bad expansion"))?;
            }
            _ => return Err(CommandError::Syntax),
        }
    }

    db.cf_reserve(&argv[1], params)?;
    Ok(Frame::simple("OK"))
}

fn cf_insert(
    argv: &[Bytes],
    db: &mut Keyspace,
    nx: bool,
) -> Result<Frame, CommandError> {
    let cmd = if nx { "cf.insertnx" } else { "cf.insert" };
    min_arity(argv, 4, cmd)?;

    let mut params = CuckooParams::default();
    let mut nocreate = false;
    let mut i = 2;
    loop {
        let Some(token) = argv.get(i) else {
            return Err(wrong_arity(cmd));
        };
        if token.eq_ignore_ascii_case(b"ITEMS") {
            i += 1;
            break;
        } else if token.eq_ignore_ascii_case(b"CAPACITY") {
            let value = argv.get(i + 1).ok_or(CommandError::Syntax)?;
            params.capacity = parse_u64(value)
                .filter(|c| *c > 0)
                .ok_or(CommandError::Invalid("ERR Bad capacity"))?;
            i += 2;
        } else if token.eq_ignore_ascii_case(b"NOCREATE") {
            nocreate = true;
            i += 1;
        } else {
            return Err(CommandError::Syntax);
        }
    }
    let items = &argv[i..];
    if items.is_empty() {
        return Err(wrong_arity(cmd));
    }

    let cf: &mut Cuckoo = if nocreate {
        db.cf_existing(&argv[1])?
    } else {
        db.cf_or_create(&argv[1], params)?
    };
    Ok(Frame::Array(
        items
            .iter()
            .map(|item| {
                Frame::Integer(match cf.add(item, nx) {
                    AddOutcome::Added => 1,
                    AddOutcome::Exists => 0,
                    AddOutcome::Full => -1,
                })
            })
            .collect(),
    ))
}

fn cf_info(cf: &Cuckoo, session: &Session) -> Frame {
    let params = cf.params();
    let int = |v: u64| Frame::Integer(i64::try_from(v).unwrap_or(i64::MAX));
    session.pairs(vec![
        ("Size", int(cf.size())),
        ("Number of buckets", int(cf.bucket_num())),
        ("Number of filters", int(cf.filters())),
        ("Number of items inserted", int(cf.items())),
        ("Number of items deleted", int(cf.deleted())),
        ("Bucket size", int(params.bucket_size)),
        ("Expansion rate", int(params.expansion)),
        ("Max iterations", int(params.max_iterations)),
    ])
}

fn arity(argv: &[Bytes], n: usize, cmd: &str) -> Result<(), CommandError> {
    if argv.len() != n {
        return Err(wrong_arity(cmd));
    }
    Ok(())
}

fn min_arity(argv: &[Bytes], n: usize, cmd: &str) -> Result<(), CommandError> {
    if argv.len() < n {
        return Err(wrong_arity(cmd));
    }
    Ok(())
}

fn wrong_arity(cmd: &str) -> CommandError {
    CommandError::WrongArity(cmd.to_string())
}

fn parse_i64(raw: &[u8]) -> Option<i64> {
    std::str::from_utf8(raw).ok()?.parse().ok()
}

fn parse_u64(raw: &[u8]) -> Option<u64> {
    std::str::from_utf8(raw).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(state: &mut FakeServerState, args: &[&str]) -> Result<Frame, CommandError> {
        let argv: Vec<Bytes> = args.iter().map(|a| Bytes::from(a.to_string())).collect();
        dispatch(&argv, state, &mut Session::default())
    }

    fn reply(state: &mut FakeServerState, args: &[&str]) -> Frame {
        run(state, args).unwrap_or_else(|e| e.to_frame())
    }

    #[test]
    fn test_frame_to_argv() {
        let frame = Frame::Array(vec![Frame::bulk("GET"), Frame::bulk("k")]);
        let argv = frame_to_argv(frame).unwrap();
        assert_eq!(argv, vec![Bytes::from("GET"), Bytes::from("k")]);

        assert_eq!(
            frame_to_argv(Frame::Array(vec![])),
            Err(CommandError::InvalidCommandFrame)
        );
        assert_eq!(
            frame_to_argv(Frame::Integer(1)),
            Err(CommandError::InvalidCommandFrame)
        );
    }

    #[test]
    fn test_unknown_command_not_implemented() {
        let mut state = FakeServerState::new();
        assert_eq!(
            run(&mut state, &["cf.scandump", "k", "0"]),
            Err(CommandError::NotImplemented("CF.SCANDUMP".to_string()))
        );
        assert_eq!(
            run(&mut state, &["CLIENT", "LIST"]),
            Err(CommandError::NotImplemented("CLIENT LIST".to_string()))
        );
    }

    #[test]
    fn test_wrong_arity_text() {
        let mut state = FakeServerState::new();
        assert_eq!(
            reply(&mut state, &["CF.ADD", "k"]),
            Frame::error("ERR wrong number of arguments for 'cf.add' command")
        );
    }

    #[test]
    fn test_cf_reserve_existing_key() {
        let mut state = FakeServerState::new();
        assert_eq!(reply(&mut state, &["CF.RESERVE", "k", "1000"]), Frame::simple("OK"));
        assert_eq!(
            reply(&mut state, &["CF.RESERVE", "k", "1000"]),
            Frame::error("ERR item exists")
        );
        assert_eq!(
            reply(&mut state, &["CF.RESERVE", "z", "0"]),
            Frame::error("ERR Bad capacity")
        );
    }

    #[test]
    fn test_cf_insert_nocreate_missing_key() {
        let mut state = FakeServerState::new();
        assert_eq!(
            reply(&mut state, &["CF.INSERTNX", "k", "NOCREATE", "ITEMS", "a"]),
            Frame::error("ERR not found")
        );
        assert!(state.is_empty());
    }

    #[test]
    fn test_cf_insert_without_items() {
        let mut state = FakeServerState::new();
        assert!(matches!(
            run(&mut state, &["CF.INSERT", "k", "CAPACITY", "10", "ITEMS"]),
            Err(CommandError::WrongArity(_))
        ));
        assert!(matches!(
            run(&mut state, &["CF.INSERT", "k", "NOCREATE", "a"]),
            Err(CommandError::Syntax)
        ));
    }

    #[test]
    fn test_cf_insert_full_filter_reports_minus_one() {
        let mut state = FakeServerState::new();
        reply(
            &mut state,
            &["CF.RESERVE", "k", "2", "BUCKETSIZE", "1", "EXPANSION", "0"],
        );
        assert_eq!(
            reply(&mut state, &["CF.INSERT", "k", "ITEMS", "a", "b", "c"]),
            Frame::Array(vec![Frame::Integer(1), Frame::Integer(1), Frame::Integer(-1)])
        );
        assert_eq!(
            reply(&mut state, &["CF.ADD", "k", "d"]),
            Frame::error("ERR Filter is full")
        );
    }

    #[test]
    fn test_cf_on_string_key_is_wrongtype() {
        let mut state = FakeServerState::new();
        reply(&mut state, &["SET", "s", "v"]);
        assert_eq!(
            reply(&mut state, &["CF.COUNT", "s", "a"]),
            Frame::error("WRONGTYPE Operation against a key holding the wrong kind of value")
        );
    }

    #[test]
    fn test_cf_missing_key_reads() {
        let mut state = FakeServerState::new();
        assert_eq!(reply(&mut state, &["CF.EXISTS", "k", "a"]), Frame::Integer(0));
        assert_eq!(reply(&mut state, &["CF.COUNT", "k", "a"]), Frame::Integer(0));
        assert_eq!(
            reply(&mut state, &["CF.DEL", "k", "a"]),
            Frame::error("ERR not found")
        );
        assert_eq!(
            reply(&mut state, &["CF.INFO", "k"]),
            Frame::error("ERR not found")
        );
    }

    #[test]
    fn test_cf_info_shape_per_protocol() {
        let mut state = FakeServerState::new();
        reply(&mut state, &["CF.RESERVE", "k", "1000"]);
        let argv = vec![Bytes::from("CF.INFO"), Bytes::from("k")];

        let resp2 = dispatch(&argv, &mut state, &mut Session::default()).unwrap();
        assert!(matches!(&resp2, Frame::Array(items) if items.len() == 16));

        let mut session = Session {
            protocol: 3,
            ..Session::default()
        };
        let resp3 = dispatch(&argv, &mut state, &mut session).unwrap();
        assert!(matches!(&resp3, Frame::Map(entries) if entries.len() == 8));
    }

    #[test]
    fn test_hello_switches_protocol() {
        let mut state = FakeServerState::new();
        let mut session = Session::default();
        let argv = vec![
            Bytes::from("HELLO"),
            Bytes::from("3"),
            Bytes::from("SETNAME"),
            Bytes::from("worker"),
        ];
        let reply = dispatch(&argv, &mut state, &mut session).unwrap();
        assert!(matches!(reply, Frame::Map(_)));
        assert_eq!(session.protocol, 3);
        assert_eq!(session.name, Some(Bytes::from("worker")));

        let argv = vec![Bytes::from("HELLO"), Bytes::from("4")];
        assert!(dispatch(&argv, &mut state, &mut session).is_err());
        assert_eq!(session.protocol, 3);
    }

    #[test]
    fn test_string_commands() {
        let mut state = FakeServerState::new();
        assert_eq!(reply(&mut state, &["GET", "k"]), Frame::BulkString(None));
        assert_eq!(reply(&mut state, &["INCRBY", "k", "5"]), Frame::Integer(5));
        assert_eq!(reply(&mut state, &["TYPE", "k"]), Frame::simple("string"));
        assert_eq!(reply(&mut state, &["EXISTS", "k", "k", "x"]), Frame::Integer(2));
        assert_eq!(reply(&mut state, &["DEL", "k", "x"]), Frame::Integer(1));
        assert_eq!(reply(&mut state, &["TYPE", "k"]), Frame::simple("none"));
        assert_eq!(
            reply(&mut state, &["INCRBY", "k", "x"]),
            Frame::error("ERR value is not an integer or out of range")
        );
        assert_eq!(
            reply(&mut state, &["SELECT", "99"]),
            Frame::error("ERR DB index is out of range")
        );
    }

    #[test]
    fn test_flushdb_clears_selected_database_only() {
        let mut state = FakeServerState::new();
        let mut first = Session::default();
        let mut second = Session::default();
        let argv = |args: &[&str]| -> Vec<Bytes> {
            args.iter().map(|a| Bytes::from(a.to_string())).collect()
        };

        dispatch(&argv(&["SELECT", "1"]), &mut state, &mut second).unwrap();
        assert_eq!(second.db, 1);
        dispatch(&argv(&["SET", "k", "one"]), &mut state, &mut second).unwrap();
        assert_eq!(
            dispatch(&argv(&["GET", "k"]), &mut state, &mut first).unwrap(),
            Frame::BulkString(None)
        );

        dispatch(&argv(&["SET", "k", "zero"]), &mut state, &mut first).unwrap();
        dispatch(&argv(&["FLUSHDB"]), &mut state, &mut first).unwrap();
        assert_eq!(
            dispatch(&argv(&["GET", "k"]), &mut state, &mut second).unwrap(),
            Frame::bulk("one")
        );

        dispatch(&argv(&["FLUSHALL", "ASYNC"]), &mut state, &mut first).unwrap();
        assert!(state.is_empty());
        assert_eq!(
            run(&mut state, &["FLUSHDB", "LATER"]),
            Err(CommandError::Syntax)
        );
    }

    #[test]
    fn test_auth_on_unprotected_server() {
        let mut state = FakeServerState::new();
        let frame = reply(&mut state, &["AUTH", "secret"]);
        assert!(matches!(frame, Frame::Error(ref e) if e.starts_with(b"ERR AUTH <password> called")));
        assert!(matches!(
            run(&mut state, &["AUTH"]),
            Err(CommandError::WrongArity(_))
        ));
    }

    #[test]
    fn test_hello_auth_on_protected_server() {
        let mut state = FakeServerState::new();
        state.require_auth(None, "secret");
        let mut session = Session::default();
        let hello = |args: &[&str]| -> Vec<Bytes> {
            args.iter().map(|a| Bytes::from(a.to_string())).collect()
        };

        assert!(dispatch(&hello(&["HELLO", "3"]), &mut state, &mut session).is_err());
        assert_eq!(session.protocol, 2);
        assert!(dispatch(
            &hello(&["HELLO", "3", "AUTH", "default", "wrong"]),
            &mut state,
            &mut session
        )
        .is_err());

        dispatch(
            &hello(&["HELLO", "3", "AUTH", "default", "secret"]),
            &mut state,
            &mut session,
        )
        .unwrap();
        assert!(session.authenticated);
        assert_eq!(session.protocol, 3);
    }
}
