use proptest::prelude::*;
use rust_sqlite_orm::build_limited_select;

fn lock_clause() -> impl Strategy<Value = String> {
    prop::sample::select(vec![" for update", " FOR UPDATE", " For Update"]).prop_map(str::to_string)
}

proptest! {
    #[test]
    fn limit_is_appended(body in "[a-eg-z0-9=?<> ]{0,30}", padding in " {0,3}") {
        let select = format!("select * from User{body}");
        let limited = build_limited_select(&format!("{select}{padding}"));
        prop_assert_eq!(limited, format!("{} limit ?,?", select.trim_end()));
    }

    #[test]
    fn lock_clause_stays_last(body in "[a-eg-z0-9=?<> ]{0,30}", lock in lock_clause()) {
        let head = format!("select * from User{body}").trim_end().to_string();
        let limited = build_limited_select(&format!("{head}{lock}"));
        prop_assert_eq!(limited, format!("{head} limit ?,?{lock}"));
    }
}

#[test]
fn limit_precedes_lock_clause() {
    assert_eq!(
        build_limited_select("select * from User where id>? for update"),
        "select * from User where id>? limit ?,? for update"
    );
    assert_eq!(
        build_limited_select("select * from User order by id"),
        "select * from User order by id limit ?,?"
    );
}
