use valet::{
    CfInsertOptions, CfReserveOptions, Client, Connector, Error, FakeClient, TcpConnector,
};

async fn fake() -> FakeClient {
    FakeClient::connect("localhost", 6000)
        .await
        .expect("fake connect never fails")
}

async fn live() -> Client<TcpConnector> {
    let client: Client = Client::connect("127.0.0.1", 6379)
        .await
        .expect("Failed to connect");
    client.flushdb().await.unwrap();
    client
}

async fn add_and_insert<C: Connector>(client: &Client<C>) {
    let cf = client.cf();
    assert!(cf.create("cuckoo", 1000).await.unwrap());
    assert!(cf.add("cuckoo", "filter").await.unwrap());
    assert!(!cf.addnx("cuckoo", "filter").await.unwrap());
    assert!(cf.addnx("cuckoo", "newItem").await.unwrap());

    let none = CfInsertOptions::default();
    let cap = CfInsertOptions::default().capacity(1000);
    assert_eq!(cf.insert("captest", &["foo"], &none).await.unwrap(), vec![1]);
    assert_eq!(cf.insert("captest", &["foo"], &cap).await.unwrap(), vec![1]);
    assert_eq!(cf.insertnx("captest", &["bar"], &none).await.unwrap(), vec![1]);
    assert_eq!(
        cf.insertnx("captest", &["food"], &CfInsertOptions::default().nocreate())
            .await
            .unwrap(),
        vec![1]
    );
    assert_eq!(
        cf.insertnx("captest", &["foo", "bar", "baz"], &none)
            .await
            .unwrap(),
        vec![0, 0, 1]
    );
    assert_eq!(cf.insertnx("captest", &["bar"], &cap).await.unwrap(), vec![0]);
    assert_eq!(cf.insert("empty1", &["foo"], &cap).await.unwrap(), vec![1]);
    assert_eq!(cf.insertnx("empty2", &["bar"], &cap).await.unwrap(), vec![1]);

    let info = cf.info("captest").await.unwrap();
    assert_eq!(info.get("insertedNum"), Some(5));
    assert_eq!(info.get("deletedNum"), Some(0));
    assert_eq!(info.get("filterNum"), Some(1));
}

async fn exists_and_del<C: Connector>(client: &Client<C>) {
    let cf = client.cf();
    assert!(cf.create("cuckoo", 1000).await.unwrap());
    assert!(cf.add("cuckoo", "filter").await.unwrap());
    assert!(cf.exists("cuckoo", "filter").await.unwrap());
    assert!(!cf.exists("cuckoo", "notexist").await.unwrap());
    assert_eq!(
        cf.mexists("cuckoo", &["filter", "notexist"]).await.unwrap(),
        vec![true, false]
    );
    assert_eq!(cf.count("cuckoo", "filter").await.unwrap(), 1);
    assert_eq!(cf.count("cuckoo", "notexist").await.unwrap(), 0);
    assert!(cf.delete("cuckoo", "filter").await.unwrap());
    assert_eq!(cf.count("cuckoo", "filter").await.unwrap(), 0);
}

#[tokio::test]
async fn test_cf_add_and_insert() {
    add_and_insert(&fake().await).await;
}

#[tokio::test]
async fn test_cf_exists_and_del() {
    exists_and_del(&fake().await).await;
}

#[tokio::test]
#[ignore]
async fn test_cf_add_and_insert_live() {
    add_and_insert(&live().await).await;
}

#[tokio::test]
#[ignore]
async fn test_cf_exists_and_del_live() {
    exists_and_del(&live().await).await;
}

#[tokio::test]
async fn test_create_existing_key_is_server_error() {
    let client = fake().await;
    client.cf().create("dup", 100).await.unwrap();
    match client.cf().create("dup", 100).await {
        Err(Error::Server { message }) => assert_eq!(message, "ERR item exists"),
        other => panic!("expected server error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_insertnx_nocreate() {
    let client = fake().await;
    let cf = client.cf();
    let nocreate = CfInsertOptions::default().nocreate();

    let err = cf.insertnx("missing", &["a"], &nocreate).await.unwrap_err();
    assert!(matches!(err, Error::Server { .. }));
    assert!(!client.exists("missing").await.unwrap());

    cf.create("present", 100).await.unwrap();
    assert_eq!(cf.insertnx("present", &["a"], &nocreate).await.unwrap(), vec![1]);
}

#[tokio::test]
async fn test_insert_creates_at_most_one_filter() {
    let client = fake().await;
    let items: Vec<String> = (0..50).map(|i| format!("item-{i}")).collect();
    let reply = client
        .cf()
        .insert("many", &items, &CfInsertOptions::default())
        .await
        .unwrap();
    assert_eq!(reply, vec![1; 50]);
    assert_eq!(client.cf().info("many").await.unwrap().filter_num, 1);
}

#[tokio::test]
async fn test_mexists_follows_argument_order() {
    let client = fake().await;
    let cf = client.cf();
    cf.insert("order", &["c", "a"], &CfInsertOptions::default())
        .await
        .unwrap();
    assert_eq!(
        cf.mexists("order", &["a", "b", "c"]).await.unwrap(),
        vec![true, false, true]
    );
    assert_eq!(
        cf.mexists("order", &["c", "b", "a"]).await.unwrap(),
        vec![true, false, true]
    );
}

#[tokio::test]
async fn test_delete_non_member_leaves_count() {
    let client = fake().await;
    let cf = client.cf();
    cf.add("del", "x").await.unwrap();
    cf.add("del", "x").await.unwrap();

    assert!(!cf.delete("del", "y").await.unwrap());
    assert_eq!(cf.count("del", "x").await.unwrap(), 2);

    assert!(cf.delete("del", "x").await.unwrap());
    assert_eq!(cf.count("del", "x").await.unwrap(), 1);
    let info = cf.info("del").await.unwrap();
    assert_eq!(info.inserted_num, 1);
    assert_eq!(info.deleted_num, 1);
}

#[tokio::test]
async fn test_delete_on_missing_filter_is_server_error() {
    let client = fake().await;
    let err = client.cf().delete("nothing", "x").await.unwrap_err();
    match err {
        Error::Server { message } => assert_eq!(message, "ERR not found"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(client.cf().count("nothing", "x").await.unwrap(), 0);
    assert!(!client.cf().exists("nothing", "x").await.unwrap());
}

#[tokio::test]
async fn test_wrong_type_is_not_a_falsy_value() {
    let client = fake().await;
    client.set("plain", "value").await.unwrap();
    let err = client.cf().count("plain", "x").await.unwrap_err();
    match err {
        Error::Server { message } => assert!(message.starts_with("WRONGTYPE")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_reserve_options() {
    let client = fake().await;
    let options = CfReserveOptions::default()
        .bucket_size(4)
        .max_iterations(50)
        .expansion(2);
    assert!(client.cf().reserve("tuned", 1000, &options).await.unwrap());

    let info = client.cf().info("tuned").await.unwrap();
    assert_eq!(info.bucket_size, 4);
    assert_eq!(info.max_iteration, 50);
    assert_eq!(info.expansion_rate, 2);
    assert_eq!(info.bucket_num, 256);
    assert_eq!(client.key_type("tuned").await.unwrap(), "MBbloomCF");
}

#[tokio::test]
async fn test_invalid_options_fail_before_sending() {
    let client = fake().await;
    let err = client
        .cf()
        .reserve("bad", 100, &CfReserveOptions::default().bucket_size(0))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Encode { .. }));

    let none: [&str; 0] = [];
    let err = client.cf().mexists("bad", &none).await.unwrap_err();
    assert!(matches!(err, Error::Encode { .. }));
    assert!(client.fake_state().lock().is_empty());
}

#[tokio::test]
async fn test_full_filter_without_expansion() {
    let client = fake().await;
    let options = CfReserveOptions::default().bucket_size(1).expansion(0);
    client.cf().reserve("tiny", 2, &options).await.unwrap();

    let reply = client
        .cf()
        .insert("tiny", &["a", "b", "c"], &CfInsertOptions::default())
        .await
        .unwrap();
    assert_eq!(reply, vec![1, 1, -1]);

    let err = client.cf().add("tiny", "d").await.unwrap_err();
    assert!(matches!(err, Error::Server { message } if message == "ERR Filter is full"));
}

#[tokio::test]
async fn test_scandump_not_implemented_by_fake() {
    let client = fake().await;
    client.cf().create("dump", 100).await.unwrap();
    let err = client.cf().scandump("dump", 0).await.unwrap_err();
    assert!(matches!(err, Error::NotImplemented { command } if command == "CF.SCANDUMP"));

    // The connection survives and keeps serving.
    assert!(client.cf().add("dump", "x").await.unwrap());
    assert_eq!(client.pool_status().open, 1);
}

#[tokio::test]
async fn test_info_over_resp3() {
    let client = valet::ClientBuilder::new()
        .host("localhost")
        .resp3(true)
        .build_with::<valet::FakeConnector>()
        .await
        .unwrap();
    client.cf().insert("r3", &["a", "b"], &CfInsertOptions::default())
        .await
        .unwrap();
    let info = client.cf().info("r3").await.unwrap();
    assert_eq!(info.inserted_num, 2);
    assert_eq!(info.filter_num, 1);
    assert_eq!(info.bucket_num, 512);
}
